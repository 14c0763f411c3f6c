//! Serial port transport implementation

use crate::io::{timed_read, timed_write};
use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialStream;
use tracer_core::{TracerError, TracerResult};

/// Default baud rate of the controller's remote-meter port
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Wrapper for SerialStream that implements Debug
struct DebugSerialStream(SerialStream);

impl fmt::Debug for DebugSerialStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialStream").finish()
    }
}

impl Deref for DebugSerialStream {
    type Target = SerialStream;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DebugSerialStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Serial port transport layer settings
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
    pub flow_control: tokio_serial::FlowControl,
    pub timeout: Option<Duration>,
}

impl SerialSettings {
    /// Create new serial settings with the controller's 8-N-1 framing
    pub fn new(port_name: String, baud_rate: u32) -> Self {
        Self {
            port_name,
            baud_rate,
            data_bits: tokio_serial::DataBits::Eight,
            stop_bits: tokio_serial::StopBits::One,
            parity: tokio_serial::Parity::None,
            flow_control: tokio_serial::FlowControl::None,
            timeout: Some(Duration::from_secs(6)),
        }
    }

    /// Create serial settings with timeout
    pub fn with_timeout(port_name: String, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new(port_name, baud_rate)
        }
    }
}

/// Serial port transport layer implementation
#[derive(Debug)]
pub struct SerialTransport {
    stream: Option<DebugSerialStream>,
    settings: SerialSettings,
    closed: bool,
}

impl SerialTransport {
    /// Create a new serial transport layer
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    /// Create serial transport with port name and baud rate
    pub fn new_simple(port_name: String, baud_rate: u32) -> Self {
        Self::new(SerialSettings::new(port_name, baud_rate))
    }

    /// Get the settings this transport was created with
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn stream_mut(&mut self) -> TracerResult<&mut DebugSerialStream> {
        self.stream.as_mut().ok_or_else(|| {
            TracerError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Serial stream not connected",
            ))
        })
    }
}

#[async_trait]
impl TransportLayer for SerialTransport {
    async fn open(&mut self) -> TracerResult<()> {
        if !self.closed {
            return Err(TracerError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let builder = tokio_serial::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .stop_bits(self.settings.stop_bits)
            .parity(self.settings.parity)
            .flow_control(self.settings.flow_control);

        let stream = SerialStream::open(&builder).map_err(|e| {
            TracerError::Connection(std::io::Error::other(format!(
                "Failed to open serial port {}: {}",
                self.settings.port_name, e
            )))
        })?;

        log::info!(
            "serial settings: {}:{:?}:{:?}:{:?}",
            self.settings.baud_rate,
            self.settings.data_bits,
            self.settings.parity,
            self.settings.stop_bits
        );

        self.stream = Some(DebugSerialStream(stream));
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for SerialTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> TracerResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> TracerResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        let n = timed_read(&mut stream.0, buf, timeout).await?;
        if n == 0 && !buf.is_empty() {
            self.closed = true;
        }
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> TracerResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;
        timed_write(&mut stream.0, buf, timeout).await
    }

    async fn flush(&mut self) -> TracerResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().await.map_err(TracerError::LinkWrite)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> TracerResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.flush().await;
        }
        self.closed = true;
        Ok(())
    }
}
