//! Transport over an already-open duplex byte stream
//!
//! The session layer never opens devices itself. Whatever the host hands over
//! (a serial stream, a socket, an in-memory pipe) is wrapped here and given
//! timeout-bounded reads.

use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracer_core::{TracerError, TracerResult};

/// Read once from `stream`, bounded by `timeout`
pub(crate) async fn timed_read<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> TracerResult<usize> {
    let result = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, stream.read(buf))
            .await
            .map_err(|_| TracerError::Timeout)?,
        None => stream.read(buf).await,
    };
    result.map_err(TracerError::LinkRead)
}

/// Write once to `stream`, bounded by `timeout`
///
/// A write that cannot complete in time is a link fault, not a receive
/// timeout, so it is reported as `LinkWrite`.
pub(crate) async fn timed_write<S: AsyncWrite + Unpin>(
    stream: &mut S,
    buf: &[u8],
    timeout: Option<Duration>,
) -> TracerResult<usize> {
    let result = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, stream.write(buf)).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "write timed out",
            )),
        },
        None => stream.write(buf).await,
    };
    result.map_err(TracerError::LinkWrite)
}

fn not_connected() -> TracerError {
    TracerError::Connection(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "Stream not connected",
    ))
}

/// Transport wrapping any tokio duplex stream
pub struct IoTransport<S> {
    stream: Option<S>,
    timeout: Option<Duration>,
    closed: bool,
}

impl<S> IoTransport<S> {
    /// Adopt an already-open stream with no read timeout
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
            timeout: None,
            closed: false,
        }
    }

    /// Adopt an already-open stream with a read timeout
    pub fn with_timeout(stream: S, timeout: Duration) -> Self {
        Self {
            stream: Some(stream),
            timeout: Some(timeout),
            closed: false,
        }
    }

    /// Get the current read timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Give the underlying stream back, if it has not been closed
    pub fn into_inner(self) -> Option<S> {
        self.stream
    }
}

impl<S> fmt::Debug for IoTransport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoTransport")
            .field("timeout", &self.timeout)
            .field("closed", &self.closed)
            .finish()
    }
}

#[async_trait]
impl<S> StreamAccessor for IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> TracerResult<()> {
        self.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> TracerResult<usize> {
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;

        let n = timed_read(stream, buf, timeout).await?;
        if n == 0 && !buf.is_empty() {
            self.closed = true;
        }
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> TracerResult<usize> {
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        timed_write(stream, buf, timeout).await
    }

    async fn flush(&mut self) -> TracerResult<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream.flush().await.map_err(TracerError::LinkWrite)
    }

    fn is_closed(&self) -> bool {
        self.closed || self.stream.is_none()
    }

    async fn close(&mut self) -> TracerResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}

#[async_trait]
impl<S> TransportLayer for IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn open(&mut self) -> TracerResult<()> {
        if self.stream.is_none() {
            return Err(not_connected());
        }
        Ok(())
    }
}
