//! TCP transport implementation
//!
//! Used with RS-485/RS-232 serial servers that expose the controller's port
//! as a raw TCP socket.

use crate::io::{timed_read, timed_write};
use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracer_core::{TracerError, TracerResult};

/// Wrapper for TcpStream that implements Debug
struct DebugTcpStream(TcpStream);

impl fmt::Debug for DebugTcpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpStream").finish()
    }
}

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub address: SocketAddr,
    pub timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            timeout: Some(Duration::from_secs(6)),
        }
    }

    /// Create TCP settings with timeout
    pub fn with_timeout(address: SocketAddr, timeout: Duration) -> Self {
        Self {
            address,
            timeout: Some(timeout),
        }
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<DebugTcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    /// Create TCP transport from address string
    pub fn from_address(address: &str) -> TracerResult<Self> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| TracerError::InvalidData(format!("Invalid TCP address: {}", e)))?;
        Ok(Self::new(TcpSettings::new(addr)))
    }

    fn stream_mut(&mut self) -> TracerResult<&mut TcpStream> {
        self.stream.as_mut().map(|s| &mut s.0).ok_or_else(|| {
            TracerError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> TracerResult<()> {
        if !self.closed {
            return Err(TracerError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let stream = if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, TcpStream::connect(self.settings.address))
                .await
                .map_err(|_| TracerError::Timeout)??
        } else {
            TcpStream::connect(self.settings.address).await?
        };
        stream.set_nodelay(true)?;
        log::info!("connected to serial server at {}", self.settings.address);

        self.stream = Some(DebugTcpStream(stream));
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> TracerResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> TracerResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        let n = timed_read(stream, buf, timeout).await?;
        if n == 0 && !buf.is_empty() {
            self.closed = true;
        }
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> TracerResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;
        timed_write(stream, buf, timeout).await
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
            let _ = stream.0.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}
