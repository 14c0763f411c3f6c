use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracer::tracer_client::scheduler::DEFAULT_DRAIN_QUIET;
use tracer::{
    DRIVER_VERSION, LoggingConsumer, PollLoop, PollerConfig, Scheduler, SessionBuilder,
};

/// Poll an EPsolar Tracer charge controller
#[derive(Debug, Parser)]
#[command(name = "tracer-poll", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port the controller is attached to
    #[arg(long)]
    port: Option<String>,

    /// TCP serial server (host:port), instead of a serial port
    #[arg(long, conflicts_with = "port")]
    tcp: Option<String>,

    /// Controller address, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_address)]
    address: Option<u8>,

    #[arg(long)]
    baud_rate: Option<u32>,

    /// Response timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Run a single cycle, print the reading and exit
    #[arg(long)]
    once: bool,

    /// Switch the load output and exit
    #[arg(long, value_enum)]
    load: Option<LoadSwitch>,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LoadSwitch {
    On,
    Off,
}

fn parse_address(value: &str) -> Result<u8, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid address {:?}: {}", value, e))
}

impl Cli {
    /// Apply command line overrides on top of the file configuration
    fn apply(&self, config: &mut PollerConfig) {
        if let Some(port) = &self.port {
            config.port = port.clone();
            config.tcp = None;
        }
        if let Some(tcp) = &self.tcp {
            config.tcp = Some(tcp.clone());
        }
        if let Some(address) = self.address {
            config.device_address = address;
        }
        if let Some(baud_rate) = self.baud_rate {
            config.baud_rate = baud_rate;
        }
        if let Some(timeout) = self.timeout {
            config.read_timeout = timeout;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::builder()
        .filter_level(if cli.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let mut config = match &cli.config {
        Some(path) => PollerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PollerConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;
    let sensor_map = config.sensor_map()?;

    log::info!("driver version is {}", DRIVER_VERSION);
    log::info!("model is {}", config.model);
    log::info!("port is {}", config.endpoint());
    log::info!("address is {}", config.device_address);
    log::info!("poll interval is {}", config.poll_interval);
    log::debug!("sensor map: {:?}", sensor_map);

    let session = SessionBuilder::from_config(&config)
        .open()
        .await
        .with_context(|| format!("opening {}", config.endpoint()))?;
    let mut poll = PollLoop::new(
        session,
        config.device_address,
        config.read_timeout_duration(),
        config.retry_policy(),
    );

    if let Some(switch) = cli.load {
        let outcome = poll.set_load(switch == LoadSwitch::On).await;
        poll.shutdown(DEFAULT_DRAIN_QUIET).await?;
        let ack = outcome?;
        println!("load_on={}", ack.load_on);
        return Ok(());
    }

    if cli.once {
        let outcome = poll.run_cycle().await;
        poll.shutdown(DEFAULT_DRAIN_QUIET).await?;
        let reading = outcome?;
        println!("{}", sensor_map.build_record(&reading, Utc::now()));
        return Ok(());
    }

    let scheduler = Scheduler::new(
        poll,
        LoggingConsumer::new(),
        sensor_map,
        config.poll_interval_duration(),
    )?;
    let (summary, _) = scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("cannot listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            log::info!("stop requested");
        })
        .await?;

    log::info!(
        "{} cycle(s), {} record(s), {} failure(s)",
        summary.cycles,
        summary.records,
        summary.failures
    );
    Ok(())
}
