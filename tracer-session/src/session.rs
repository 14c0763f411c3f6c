//! Link session
//!
//! Owns the transport and a receive buffer, writes request frames and
//! extracts validated response frames from the byte stream.

use crate::decoder::{try_decode_frame, DecodeOutcome, RejectReason};
use crate::frame::{Frame, PREAMBLE, SYNC_MARKER};
use crate::state::LinkState;
use crate::statistics::LinkStatistics;
use bytes::{Buf, BytesMut};
use std::time::Duration;
use tokio::time::Instant;
use tracer_core::{TracerError, TracerResult};
use tracer_transport::{StreamAccessor, TransportLayer};

/// Bytes requested from the transport per read
const READ_CHUNK_SIZE: usize = 64;

/// Timeout applied to writes unless configured otherwise
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(6);

/// A drain gives up after this many quiet periods of continuous input
pub const DRAIN_QUIET_PERIODS: u32 = 10;

/// A drain gives up after discarding this many bytes
pub const MAX_DRAIN_BYTES: usize = 4096;

/// Stand-in deadline for timeouts too large to add to the current instant
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Link session over a byte-stream transport
///
/// One request is outstanding at a time. Every call to [`send`](Self::send)
/// starts a fresh exchange: bytes left over from earlier exchanges are
/// dropped so that a late answer to an old request is never mistaken for a
/// new one.
#[derive(Debug)]
pub struct LinkSession<T: StreamAccessor> {
    transport: T,
    buffer: BytesMut,
    state: LinkState,
    statistics: LinkStatistics,
    local_echo: bool,
    write_timeout: Option<Duration>,
}

impl<T: StreamAccessor> LinkSession<T> {
    /// Create a new session over an already usable transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE * 2),
            state: LinkState::Idle,
            statistics: LinkStatistics::new(),
            local_echo: false,
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
        }
    }

    /// Expect every request to be read back once before its answer
    ///
    /// Needed on half-duplex RS-485 adapters that echo transmitted bytes.
    pub fn set_local_echo(&mut self, local_echo: bool) {
        self.local_echo = local_echo;
    }

    pub fn local_echo(&self) -> bool {
        self.local_echo
    }

    /// Timeout for writing a request; receive budgets never carry over
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.write_timeout = timeout;
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    /// Send one request frame
    ///
    /// # Process
    /// 1. Drop any unconsumed receive bytes and reset the receive state
    /// 2. Restore the write timeout, then write the wake-up preamble
    ///    followed by the encoded frame
    /// 3. Flush, then wait for a sync marker
    ///
    /// # Errors
    /// Returns `TracerError::LinkWrite` if the transport is closed or did
    /// not accept every byte.
    pub async fn send(&mut self, frame: &Frame) -> TracerResult<()> {
        self.reset();

        if self.transport.is_closed() {
            return Err(TracerError::LinkWrite(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "link is closed",
            )));
        }

        self.transport.set_timeout(self.write_timeout).await?;

        let mut wire = Vec::with_capacity(PREAMBLE.len() + frame.wire_length());
        wire.extend_from_slice(&PREAMBLE);
        wire.extend_from_slice(&frame.to_bytes());

        let written = match self.transport.write_all(&wire).await {
            Ok(()) => self.transport.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| match e {
            TracerError::Connection(io) => TracerError::LinkWrite(io),
            other => other,
        })?;

        self.statistics.increment_frames_sent();
        self.transition_to(LinkState::AwaitingSync)?;
        log::debug!("sent {}", frame);
        Ok(())
    }

    /// Receive the next valid frame, whatever it answers
    ///
    /// Reads until a frame passes checksum and trailer validation or the
    /// deadline expires. Rejected candidates and garbage are skipped
    /// silently, so this never fails with `FrameInvalid`.
    ///
    /// # Errors
    /// - `TracerError::Timeout` if no valid frame completes within `timeout`
    /// - `TracerError::LinkRead` if the transport fails or is closed by the peer
    pub async fn receive_frame(&mut self, timeout: Duration) -> TracerResult<Frame> {
        let deadline = deadline_after(timeout);
        if self.state == LinkState::Idle {
            self.transition_to(LinkState::AwaitingSync)?;
        }

        let result = self.receive_until(deadline).await;
        self.state = LinkState::Idle;
        result
    }

    /// Receive the frame answering `request`
    ///
    /// Frames from other addresses or for other commands are counted and
    /// dropped. With local echo enabled, the first frame identical to the
    /// request is dropped as well. All of this shares one deadline.
    pub async fn receive_response(
        &mut self,
        request: &Frame,
        timeout: Duration,
    ) -> TracerResult<Frame> {
        let deadline = deadline_after(timeout);
        let mut echo_pending = self.local_echo;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = self.receive_frame(remaining).await?;

            if echo_pending && frame.to_bytes() == request.to_bytes() {
                echo_pending = false;
                log::trace!("dropping local echo of {}", request);
                continue;
            }
            if request.is_answered_by(&frame) {
                return Ok(frame);
            }

            self.statistics.increment_uncorrelated_frames();
            log::debug!("dropping uncorrelated {}", frame);
        }
    }

    /// Discard everything pending on the link
    ///
    /// Drops the receive buffer, then keeps reading until the line has been
    /// quiet for `quiet`. A line that never goes quiet is abandoned after
    /// [`DRAIN_QUIET_PERIODS`] times `quiet` or [`MAX_DRAIN_BYTES`] bytes,
    /// whichever comes first. Returns the number of bytes thrown away.
    pub async fn drain(&mut self, quiet: Duration) -> TracerResult<usize> {
        let mut discarded = self.buffer.len();
        self.reset();

        if !self.transport.is_closed() && !quiet.is_zero() {
            let deadline = deadline_after(quiet.saturating_mul(DRAIN_QUIET_PERIODS));
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() || discarded >= MAX_DRAIN_BYTES {
                    log::warn!(
                        "link still busy after discarding {} byte(s), giving up",
                        discarded
                    );
                    break;
                }

                self.transport.set_timeout(Some(quiet.min(remaining))).await?;
                match self.transport.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => discarded += n,
                    Err(TracerError::Timeout) => break,
                    Err(e) => return Err(e),
                }
            }
        }

        self.statistics.add_drained_bytes(discarded);
        if discarded > 0 {
            log::debug!("drained {} stale byte(s)", discarded);
        }
        Ok(discarded)
    }

    /// Close the underlying transport
    pub async fn close(&mut self) -> TracerResult<()> {
        self.reset();
        self.transport.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn statistics(&self) -> &LinkStatistics {
        &self.statistics
    }

    pub fn clear_statistics(&mut self) {
        self.statistics.clear();
    }

    /// Bytes received but not yet consumed
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state = LinkState::Idle;
    }

    fn transition_to(&mut self, new_state: LinkState) -> TracerResult<()> {
        self.state.validate_transition(new_state)?;
        if self.state != new_state {
            log::trace!("link state {} -> {}", self.state, new_state);
        }
        self.state = new_state;
        Ok(())
    }

    async fn receive_until(&mut self, deadline: Instant) -> TracerResult<Frame> {
        loop {
            if let Some(frame) = self.decode_buffered()? {
                return Ok(frame);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.statistics.increment_timeouts();
                return Err(TracerError::Timeout);
            }
            self.fill_buffer(remaining).await?;
        }
    }

    /// Decode from the buffer until a frame is found or more input is needed
    fn decode_buffered(&mut self) -> TracerResult<Option<Frame>> {
        loop {
            match try_decode_frame(&self.buffer) {
                DecodeOutcome::Frame { frame, consumed } => {
                    self.transition_to(LinkState::Validating)?;
                    self.buffer.advance(consumed);
                    self.statistics.increment_frames_received();
                    log::debug!("received {}", frame);
                    return Ok(Some(frame));
                }
                DecodeOutcome::NeedMoreBytes => {
                    let next = if self.buffer.starts_with(&SYNC_MARKER) {
                        LinkState::AwaitingPayload
                    } else {
                        LinkState::AwaitingSync
                    };
                    self.transition_to(next)?;
                    return Ok(None);
                }
                DecodeOutcome::InvalidFrame { discard, reason } => {
                    self.reject(discard, reason)?;
                }
            }
        }
    }

    fn reject(&mut self, discard: usize, reason: RejectReason) -> TracerResult<()> {
        match reason {
            RejectReason::Garbage => {
                self.statistics.add_garbage_bytes(discard);
                log::trace!("skipping {} byte(s) before sync marker", discard);
            }
            RejectReason::Checksum { expected, received } => {
                self.transition_to(LinkState::Validating)?;
                self.statistics.record_rejection(true);
                log::debug!(
                    "checksum mismatch: expected 0x{:04X}, received 0x{:04X}",
                    expected,
                    received
                );
            }
            RejectReason::Trailer(byte) => {
                self.transition_to(LinkState::Validating)?;
                self.statistics.record_rejection(false);
                log::debug!("bad trailer 0x{:02X}", byte);
            }
            RejectReason::Superseded => {
                self.statistics.record_rejection(false);
                log::debug!("abandoning incomplete candidate for a later frame");
            }
        }

        self.transition_to(LinkState::AwaitingSync)?;
        self.buffer.advance(discard);
        Ok(())
    }

    async fn fill_buffer(&mut self, remaining: Duration) -> TracerResult<()> {
        self.transport.set_timeout(Some(remaining)).await?;

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match self.transport.read(&mut chunk).await {
            Ok(0) => Err(TracerError::LinkRead(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "link closed by peer",
            ))),
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                Ok(())
            }
            Err(TracerError::Timeout) => {
                self.statistics.increment_timeouts();
                Err(TracerError::Timeout)
            }
            Err(TracerError::Connection(io)) => Err(TracerError::LinkRead(io)),
            Err(e) => Err(e),
        }
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

impl<T: TransportLayer> LinkSession<T> {
    /// Open the underlying transport
    pub async fn open(&mut self) -> TracerResult<()> {
        self.reset();
        self.transport.open().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracer_core::FunctionCode;
    use tracer_transport::{ReadEvent, ScriptedTransport};

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn request(address: u8) -> Frame {
        Frame::encode_request(address, FunctionCode::RealTimeData, &[]).unwrap()
    }

    fn response(address: u8, fill: u8) -> Vec<u8> {
        Frame::encode_response(address, FunctionCode::RealTimeData, &[fill; 24])
            .unwrap()
            .to_bytes()
    }

    fn session(events: Vec<ReadEvent>) -> LinkSession<ScriptedTransport> {
        LinkSession::new(ScriptedTransport::with_reads(events))
    }

    #[tokio::test]
    async fn test_send_writes_preamble_and_frame() {
        let mut link = session(vec![]);
        link.send(&request(0x16)).await.unwrap();

        let mut expected = PREAMBLE.to_vec();
        expected.extend_from_slice(&[
            0xEB, 0x90, 0xEB, 0x90, 0xEB, 0x90, 0x16, 0xA0, 0x00, 0xB1, 0xA7, 0x7F,
        ]);
        assert_eq!(link.transport().written(), expected.as_slice());
        assert_eq!(link.state(), LinkState::AwaitingSync);
        assert_eq!(link.statistics().frames_sent, 1);
    }

    #[tokio::test]
    async fn test_short_write_is_link_write_error() {
        let mut link = session(vec![]);
        link.transport_mut().reject_writes(1);
        let result = link.send(&request(0x16)).await;
        assert!(matches!(result, Err(TracerError::LinkWrite(_))));
        assert_eq!(link.state(), LinkState::Idle);
        assert_eq!(link.statistics().frames_sent, 0);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let bytes = response(0x16, 0x22);
        let events = bytes
            .chunks(5)
            .map(|chunk| ReadEvent::Data(chunk.to_vec()))
            .collect();
        let mut link = session(events);
        link.send(&request(0x16)).await.unwrap();

        let frame = link.receive_frame(TIMEOUT).await.unwrap();
        assert_eq!(frame.payload(), &[0x22; 24]);
        assert_eq!(link.state(), LinkState::Idle);
        assert_eq!(link.statistics().frames_received, 1);
    }

    #[tokio::test]
    async fn test_checksum_error_then_valid_frame_in_one_read() {
        let mut stream = response(0x16, 0x33);
        let pos = stream.len() - 3;
        stream[pos] ^= 0x80;
        stream.extend_from_slice(&response(0x16, 0x44));

        let mut link = session(vec![ReadEvent::Data(stream)]);
        link.send(&request(0x16)).await.unwrap();

        let frame = link.receive_frame(TIMEOUT).await.unwrap();
        assert_eq!(frame.payload(), &[0x44; 24]);
        assert_eq!(link.statistics().checksum_errors, 1);
        assert_eq!(link.statistics().frames_rejected, 1);
    }

    #[tokio::test]
    async fn test_garbage_before_frame() {
        let mut stream = vec![0x00, 0xFF, 0xEB, 0x13, 0x90];
        stream.extend_from_slice(&response(0x16, 0x55));

        let mut link = session(vec![ReadEvent::Data(stream)]);
        link.send(&request(0x16)).await.unwrap();

        let frame = link.receive_frame(TIMEOUT).await.unwrap();
        assert_eq!(frame.payload(), &[0x55; 24]);
        assert_eq!(link.statistics().garbage_bytes, 5);
    }

    #[tokio::test]
    async fn test_silence_times_out() {
        let mut link = session(vec![ReadEvent::Silence]);
        link.send(&request(0x16)).await.unwrap();

        let result = link.receive_frame(TIMEOUT).await;
        assert!(matches!(result, Err(TracerError::Timeout)));
        assert_eq!(link.state(), LinkState::Idle);
        assert_eq!(link.statistics().timeouts, 1);
    }

    #[tokio::test]
    async fn test_partial_frame_then_silence_times_out() {
        let bytes = response(0x16, 0x66);
        let mut link = session(vec![
            ReadEvent::Data(bytes[..10].to_vec()),
            ReadEvent::Silence,
        ]);
        link.send(&request(0x16)).await.unwrap();

        assert!(matches!(
            link.receive_frame(TIMEOUT).await,
            Err(TracerError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_eof_and_fault_are_link_read_errors() {
        let mut link = session(vec![ReadEvent::Eof]);
        link.send(&request(0x16)).await.unwrap();
        assert!(matches!(
            link.receive_frame(TIMEOUT).await,
            Err(TracerError::LinkRead(_))
        ));

        let mut link = session(vec![ReadEvent::Fault]);
        link.send(&request(0x16)).await.unwrap();
        assert!(matches!(
            link.receive_frame(TIMEOUT).await,
            Err(TracerError::LinkRead(_))
        ));
    }

    #[tokio::test]
    async fn test_receive_response_skips_foreign_frames() {
        let mut stream = response(0x02, 0x77);
        stream.extend_from_slice(&response(0x16, 0x88));

        let mut link = session(vec![ReadEvent::Data(stream)]);
        let req = request(0x16);
        link.send(&req).await.unwrap();

        let frame = link.receive_response(&req, TIMEOUT).await.unwrap();
        assert_eq!(frame.address(), 0x16);
        assert_eq!(frame.payload(), &[0x88; 24]);
        assert_eq!(link.statistics().uncorrelated_frames, 1);
    }

    #[tokio::test]
    async fn test_local_echo_is_dropped() {
        let req = Frame::encode_request(0x16, FunctionCode::LoadControl, &[0x01]).unwrap();
        let answer = Frame::encode_response(0x16, FunctionCode::LoadControl, &[0x00])
            .unwrap()
            .to_bytes();
        let mut stream = req.to_bytes();
        stream.extend_from_slice(&answer);

        let mut link = session(vec![ReadEvent::Data(stream)]);
        link.set_local_echo(true);
        link.send(&req).await.unwrap();

        let frame = link.receive_response(&req, TIMEOUT).await.unwrap();
        assert_eq!(frame.payload(), &[0x00]);
        assert_eq!(link.statistics().uncorrelated_frames, 0);
    }

    #[tokio::test]
    async fn test_send_drops_stale_bytes() {
        let bytes = response(0x16, 0x99);
        let mut link = session(vec![ReadEvent::Data(bytes[..20].to_vec()), ReadEvent::Silence]);
        link.send(&request(0x16)).await.unwrap();
        assert!(link.receive_frame(TIMEOUT).await.is_err());
        assert_eq!(link.pending_bytes(), 20);

        link.send(&request(0x16)).await.unwrap();
        assert_eq!(link.pending_bytes(), 0);
    }

    #[tokio::test]
    async fn test_drain_discards_pending_input() {
        let mut link = session(vec![
            ReadEvent::Data(vec![0x01; 10]),
            ReadEvent::Data(vec![0x02; 3]),
            ReadEvent::Silence,
        ]);
        let drained = link.drain(Duration::from_millis(50)).await.unwrap();
        assert_eq!(drained, 13);
        assert_eq!(link.statistics().drained_bytes, 13);
        assert_eq!(link.transport().remaining_reads(), 0);
    }

    #[tokio::test]
    async fn test_drain_stops_at_byte_limit() {
        let mut link = session(vec![ReadEvent::Data(vec![0x55; READ_CHUNK_SIZE]); 100]);
        let drained = link.drain(Duration::from_millis(50)).await.unwrap();
        assert_eq!(drained, MAX_DRAIN_BYTES);
        assert_eq!(
            link.transport().remaining_reads(),
            100 - MAX_DRAIN_BYTES / READ_CHUNK_SIZE
        );
    }

    /// Line that delivers a byte every millisecond and never goes quiet
    #[derive(Debug, Default)]
    struct Chatter {
        closed: bool,
    }

    #[async_trait::async_trait]
    impl StreamAccessor for Chatter {
        async fn set_timeout(&mut self, _timeout: Option<Duration>) -> TracerResult<()> {
            Ok(())
        }

        async fn read(&mut self, buf: &mut [u8]) -> TracerResult<usize> {
            tokio::time::sleep(Duration::from_millis(1)).await;
            buf[0] = 0xFF;
            Ok(1)
        }

        async fn write(&mut self, buf: &[u8]) -> TracerResult<usize> {
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

    #[tokio::test]
    async fn test_drain_gives_up_on_busy_line() {
        let mut link = LinkSession::new(Chatter::default());
        let drained = tokio::time::timeout(
            Duration::from_secs(2),
            link.drain(Duration::from_millis(20)),
        )
        .await
        .expect("drain did not return on a busy line")
        .unwrap();
        assert!(drained > 0);
        assert!(drained < MAX_DRAIN_BYTES);

        link.close().await.unwrap();
        assert!(link.is_closed());
    }

    #[tokio::test]
    async fn test_send_restores_write_timeout() {
        let mut link = session(vec![ReadEvent::Silence]);
        link.set_write_timeout(Some(Duration::from_secs(3)));
        link.send(&request(0x16)).await.unwrap();
        assert_eq!(link.transport().timeout(), Some(Duration::from_secs(3)));

        assert!(link.receive_frame(Duration::from_millis(5)).await.is_err());
        assert!(link.transport().timeout().unwrap() <= Duration::from_millis(5));

        link.send(&request(0x16)).await.unwrap();
        assert_eq!(link.transport().timeout(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_huge_timeout_does_not_overflow() {
        let mut link = session(vec![ReadEvent::Silence]);
        link.send(&request(0x16)).await.unwrap();
        assert!(matches!(
            link.receive_response(&request(0x16), Duration::MAX).await,
            Err(TracerError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_load_on_answer_matching_request_is_accepted() {
        // Request and answer share one wire format; without echo handling
        // an answer identical to the request is the answer
        let req = Frame::encode_request(0x16, FunctionCode::LoadControl, &[0x01]).unwrap();
        let mut link = session(vec![ReadEvent::Data(req.to_bytes())]);
        link.send(&req).await.unwrap();

        let frame = link.receive_response(&req, TIMEOUT).await.unwrap();
        assert_eq!(frame.to_bytes(), req.to_bytes());
        assert_eq!(frame.payload(), &[0x01]);
    }

    #[tokio::test]
    async fn test_closed_link_refuses_to_send() {
        let mut link = session(vec![]);
        link.close().await.unwrap();
        assert!(link.is_closed());
        assert!(matches!(
            link.send(&request(0x16)).await,
            Err(TracerError::LinkWrite(_))
        ));

        link.open().await.unwrap();
        assert!(link.send(&request(0x16)).await.is_ok());
    }
}
