//! Transport replaying a fixed script of link events
//!
//! Useful for replaying captured traffic offline and for driving the session
//! layer through timeouts and link faults without real hardware or real
//! delays.

use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tracer_core::{TracerError, TracerResult};

/// One scripted outcome of a read call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// Bytes arriving on the link. Delivered across several reads if the
    /// caller's buffer is smaller.
    Data(Vec<u8>),
    /// Nothing arrives before the read timeout
    Silence,
    /// The read fails with an I/O error
    Fault,
    /// The peer closed the stream
    Eof,
}

/// Scripted transport
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    reads: VecDeque<ReadEvent>,
    written: Vec<u8>,
    write_count: usize,
    rejected_writes: usize,
    timeout: Option<Duration>,
    closed: bool,
}

impl ScriptedTransport {
    /// Create a transport with an empty script; reads time out
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that will replay `events` in order
    pub fn with_reads<I: IntoIterator<Item = ReadEvent>>(events: I) -> Self {
        Self {
            reads: events.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Append an event to the read script
    pub fn push_read(&mut self, event: ReadEvent) {
        self.reads.push_back(event);
    }

    /// Make the next `count` writes accept zero bytes
    pub fn reject_writes(&mut self, count: usize) {
        self.rejected_writes = count;
    }

    /// All bytes written so far
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Number of write calls that accepted data
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    /// Number of scripted read events not yet consumed
    pub fn remaining_reads(&self) -> usize {
        self.reads.len()
    }

    /// Last timeout requested by the caller
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl StreamAccessor for ScriptedTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> TracerResult<()> {
        self.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> TracerResult<usize> {
        match self.reads.pop_front() {
            Some(ReadEvent::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    self.reads.push_front(ReadEvent::Data(rest));
                }
                Ok(n)
            }
            Some(ReadEvent::Silence) | None => Err(TracerError::Timeout),
            Some(ReadEvent::Fault) => Err(TracerError::LinkRead(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted read fault",
            ))),
            Some(ReadEvent::Eof) => {
                self.closed = true;
                Ok(0)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> TracerResult<usize> {
        if self.closed {
            return Err(TracerError::LinkWrite(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted transport closed",
            )));
        }
        if self.rejected_writes > 0 {
            self.rejected_writes -= 1;
            return Ok(0);
        }
        self.written.extend_from_slice(buf);
        self.write_count += 1;
        Ok(buf.len())
    }

    async fn flush(&mut self) -> TracerResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> TracerResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[async_trait]
impl TransportLayer for ScriptedTransport {
    async fn open(&mut self) -> TracerResult<()> {
        self.closed = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_data_is_split_across_small_reads() {
        let mut transport = ScriptedTransport::with_reads([ReadEvent::Data(vec![1, 2, 3])]);
        let mut buf = [0u8; 2];
        assert_eq!(transport.read(&mut buf).await.unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(transport.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], 3);
        assert!(matches!(transport.read(&mut buf).await, Err(TracerError::Timeout)));
    }

    #[tokio::test]
    async fn test_rejected_write_is_short() {
        let mut transport = ScriptedTransport::new();
        transport.reject_writes(1);
        let result = transport.write_all(&[0xAA]).await;
        assert!(matches!(result, Err(TracerError::LinkWrite(_))));
        transport.write_all(&[0xAA]).await.unwrap();
        assert_eq!(transport.written(), &[0xAA]);
    }
}
