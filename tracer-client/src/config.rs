//! Poller configuration
//!
//! Loaded from TOML. Every key is optional; missing keys take the defaults
//! of the controller's remote-meter port.
//!
//! ```toml
//! port = "/dev/ttyUSB0"
//! device_address = 1
//! poll_interval = 10
//! read_timeout = 6.0
//! max_retries = 3
//! retry_wait = 5
//!
//! [sensor_map]
//! outTemp = "battery_temperature"
//! supplyVoltage = "battery_voltage"
//! ```

use crate::consumer::SensorMap;
use crate::poll::RetryPolicy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracer_core::{TracerError, TracerResult};

pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_MODEL: &str = "Tracer";

/// Longest accepted interval, timeout or pause
pub const MAX_DURATION: Duration = Duration::from_secs(86_400);

/// Poller configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollerConfig {
    /// Serial device the controller is attached to
    pub port: String,
    /// `host:port` of a serial server, used instead of `port` when set
    pub tcp: Option<String>,
    pub baud_rate: u32,
    pub device_address: u8,
    /// Seconds between the starts of two cycles
    pub poll_interval: f64,
    /// Seconds to wait for a response to one request
    pub read_timeout: f64,
    /// Attempts per cycle
    pub max_retries: u32,
    /// Seconds to pause between attempts of one cycle
    pub retry_wait: f64,
    /// Controller model, reported in logs
    pub model: String,
    /// The adapter echoes transmitted bytes back
    pub local_echo: bool,
    /// Host field name to reading field name
    pub sensor_map: BTreeMap<String, String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            tcp: None,
            baud_rate: tracer_transport::serial::DEFAULT_BAUD_RATE,
            device_address: 1,
            poll_interval: 10.0,
            read_timeout: 6.0,
            max_retries: 3,
            retry_wait: 5.0,
            model: DEFAULT_MODEL.to_string(),
            local_echo: false,
            sensor_map: BTreeMap::new(),
        }
    }
}

impl PollerConfig {
    /// Load and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> TracerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TracerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> TracerResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| TracerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and cross-field constraints
    pub fn validate(&self) -> TracerResult<()> {
        seconds("poll_interval", self.poll_interval, false)?;
        seconds("read_timeout", self.read_timeout, false)?;
        seconds("retry_wait", self.retry_wait, true)?;
        if self.baud_rate == 0 {
            return Err(TracerError::Config("baud_rate must be positive".to_string()));
        }
        match &self.tcp {
            Some(address) => {
                address.parse::<SocketAddr>().map_err(|e| {
                    TracerError::Config(format!("invalid tcp endpoint {:?}: {}", address, e))
                })?;
            }
            None if self.port.trim().is_empty() => {
                return Err(TracerError::Config(
                    "either port or tcp must be set".to_string(),
                ));
            }
            None => {}
        }
        self.sensor_map()?;
        Ok(())
    }

    /// Poll interval, capped at `MAX_DURATION`; zero if the value does not convert
    pub fn poll_interval_duration(&self) -> Duration {
        clamp_seconds(self.poll_interval)
    }

    pub fn read_timeout_duration(&self) -> Duration {
        clamp_seconds(self.read_timeout)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, clamp_seconds(self.retry_wait))
    }

    /// Sensor map to build records with; the identity map when none is set
    pub fn sensor_map(&self) -> TracerResult<SensorMap> {
        if self.sensor_map.is_empty() {
            Ok(SensorMap::default())
        } else {
            SensorMap::new(self.sensor_map.clone())
        }
    }

    /// Human readable endpoint, for logs
    pub fn endpoint(&self) -> &str {
        self.tcp.as_deref().unwrap_or(&self.port)
    }
}

/// Check a seconds value converts to a duration within `MAX_DURATION`
fn seconds(name: &str, value: f64, allow_zero: bool) -> TracerResult<Duration> {
    let invalid = || {
        TracerError::Config(format!(
            "{} must be between {} and {} seconds, got {}",
            name,
            if allow_zero { "0" } else { "more than 0" },
            MAX_DURATION.as_secs(),
            value
        ))
    };

    let duration = Duration::try_from_secs_f64(value).map_err(|_| invalid())?;
    if (duration.is_zero() && !allow_zero) || duration > MAX_DURATION {
        return Err(invalid());
    }
    Ok(duration)
}

fn clamp_seconds(value: f64) -> Duration {
    if value >= MAX_DURATION.as_secs_f64() {
        return MAX_DURATION;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
