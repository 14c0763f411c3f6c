//! Stream accessor trait for transport layer

use async_trait::async_trait;
use std::time::Duration;
use tracer_core::{TracerError, TracerResult};

/// Stream accessor interface to access a physical stream to a charge controller
#[async_trait]
pub trait StreamAccessor: Send {
    /// Set the read timeout
    ///
    /// # Arguments
    ///
    /// * `timeout` - The timeout duration. None means infinite timeout.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> TracerResult<()>;

    /// Read data from the stream
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF. A read that sees no data within the
    /// configured timeout fails with `TracerError::Timeout`.
    async fn read(&mut self, buf: &mut [u8]) -> TracerResult<usize>;

    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> TracerResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> TracerResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(TracerError::LinkWrite(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", written, buf.len()),
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> TracerResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> TracerResult<()>;
}

/// Transport layer trait that extends StreamAccessor
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the physical layer connection
    async fn open(&mut self) -> TracerResult<()>;
}
