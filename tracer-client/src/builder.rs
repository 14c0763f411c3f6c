//! Session builder
//!
//! ```rust,no_run
//! use tracer_client::SessionBuilder;
//!
//! # async fn demo() -> tracer_core::TracerResult<()> {
//! // Controller on a local serial port
//! let session = SessionBuilder::new()
//!     .serial("/dev/ttyUSB0", 9600)
//!     .open()
//!     .await?;
//!
//! // Controller behind a serial server
//! let session = SessionBuilder::new().tcp("192.168.1.50:8899").open().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::PollerConfig;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tracer_core::{TracerError, TracerResult};
use tracer_session::LinkSession;
use tracer_transport::{
    SerialSettings, SerialTransport, StreamAccessor, TcpSettings, TcpTransport, TransportLayer,
};

/// Default per-request timeout, matching the controller's slowest answers
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

/// Transport selected at runtime
#[derive(Debug)]
pub enum LinkTransport {
    Serial(SerialTransport),
    Tcp(TcpTransport),
}

#[async_trait]
impl StreamAccessor for LinkTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> TracerResult<()> {
        match self {
            LinkTransport::Serial(t) => t.set_timeout(timeout).await,
            LinkTransport::Tcp(t) => t.set_timeout(timeout).await,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> TracerResult<usize> {
        match self {
            LinkTransport::Serial(t) => t.read(buf).await,
            LinkTransport::Tcp(t) => t.read(buf).await,
        }
    }

    async fn write(&mut self, buf: &[u8]) -> TracerResult<usize> {
        match self {
            LinkTransport::Serial(t) => t.write(buf).await,
            LinkTransport::Tcp(t) => t.write(buf).await,
        }
    }

    async fn flush(&mut self) -> TracerResult<()> {
        match self {
            LinkTransport::Serial(t) => t.flush().await,
            LinkTransport::Tcp(t) => t.flush().await,
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            LinkTransport::Serial(t) => t.is_closed(),
            LinkTransport::Tcp(t) => t.is_closed(),
        }
    }

    async fn close(&mut self) -> TracerResult<()> {
        match self {
            LinkTransport::Serial(t) => t.close().await,
            LinkTransport::Tcp(t) => t.close().await,
        }
    }
}

#[async_trait]
impl TransportLayer for LinkTransport {
    async fn open(&mut self) -> TracerResult<()> {
        match self {
            LinkTransport::Serial(t) => t.open().await,
            LinkTransport::Tcp(t) => t.open().await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    Serial { port_name: String, baud_rate: u32 },
    Tcp { address: String },
    None,
}

/// Builder for link sessions
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    endpoint: Endpoint,
    timeout: Duration,
    local_echo: bool,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::None,
            timeout: DEFAULT_TIMEOUT,
            local_echo: false,
        }
    }

    /// Take endpoint, timeout and echo handling from a configuration
    pub fn from_config(config: &PollerConfig) -> Self {
        let builder = match &config.tcp {
            Some(address) => Self::new().tcp(address),
            None => Self::new().serial(&config.port, config.baud_rate),
        };
        builder
            .timeout(config.read_timeout_duration())
            .local_echo(config.local_echo)
    }

    /// Use a serial port, 8N1
    pub fn serial(mut self, port_name: &str, baud_rate: u32) -> Self {
        self.endpoint = Endpoint::Serial {
            port_name: port_name.to_string(),
            baud_rate,
        };
        self
    }

    /// Use a TCP serial server at `host:port`
    pub fn tcp(mut self, address: &str) -> Self {
        self.endpoint = Endpoint::Tcp {
            address: address.to_string(),
        };
        self
    }

    /// Timeout for connecting and for each read
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_echo(mut self, local_echo: bool) -> Self {
        self.local_echo = local_echo;
        self
    }

    /// Build an unopened session
    ///
    /// # Errors
    /// Returns `TracerError::Config` if no endpoint was set or the TCP
    /// address does not parse.
    pub fn build(&self) -> TracerResult<LinkSession<LinkTransport>> {
        let transport = match &self.endpoint {
            Endpoint::Serial {
                port_name,
                baud_rate,
            } => LinkTransport::Serial(SerialTransport::new(SerialSettings::with_timeout(
                port_name.clone(),
                *baud_rate,
                self.timeout,
            ))),
            Endpoint::Tcp { address } => {
                let address: SocketAddr = address.parse().map_err(|e| {
                    TracerError::Config(format!("invalid tcp endpoint {:?}: {}", address, e))
                })?;
                LinkTransport::Tcp(TcpTransport::new(TcpSettings::with_timeout(
                    address,
                    self.timeout,
                )))
            }
            Endpoint::None => {
                return Err(TracerError::Config(
                    "no serial port or tcp endpoint configured".to_string(),
                ));
            }
        };

        let mut session = LinkSession::new(transport);
        session.set_local_echo(self.local_echo);
        session.set_write_timeout(Some(self.timeout));
        Ok(session)
    }

    /// Build the session and open its transport
    pub async fn open(&self) -> TracerResult<LinkSession<LinkTransport>> {
        let mut session = self.build()?;
        session.open().await?;
        Ok(session)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
