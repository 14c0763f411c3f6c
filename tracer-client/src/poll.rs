//! Poll cycles with bounded retries
//!
//! A cycle is one complete exchange: build the request, send it, wait for
//! the correlated response and decode it. Transient failures repeat the
//! same cycle until the retry budget is spent. The loop never sleeps
//! between cycles; pacing belongs to the caller.

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracer_application::{Command, FieldDecoder, LoadControlAck, Reading};
use tracer_core::{TracerError, TracerResult};
use tracer_session::{Frame, LinkSession};
use tracer_transport::StreamAccessor;

/// Default number of attempts per cycle
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry budget of a single cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per cycle; 0 behaves like 1
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one
    pub retry_wait: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_wait: Duration) -> Self {
        Self {
            max_attempts,
            retry_wait,
        }
    }

    /// Attempts actually made per cycle
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Duration::ZERO)
    }
}

/// Category of a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Timeout,
    InvalidFrame,
    LinkWrite,
    LinkRead,
    SchemaMismatch,
    Encoding,
    /// Transport could not be used at all (not opened, bad settings)
    Link,
}

impl FailureReason {
    /// Whether the cycle is repeated after a failure of this kind
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureReason::Timeout
                | FailureReason::InvalidFrame
                | FailureReason::LinkWrite
                | FailureReason::LinkRead
        )
    }
}

impl From<&TracerError> for FailureReason {
    fn from(error: &TracerError) -> Self {
        match error {
            TracerError::Timeout => FailureReason::Timeout,
            TracerError::FrameInvalid(_) => FailureReason::InvalidFrame,
            TracerError::LinkWrite(_) => FailureReason::LinkWrite,
            TracerError::LinkRead(_) => FailureReason::LinkRead,
            TracerError::SchemaMismatch(_) => FailureReason::SchemaMismatch,
            TracerError::Encoding(_) => FailureReason::Encoding,
            TracerError::InvalidData(_) | TracerError::Config(_) | TracerError::Connection(_) => {
                FailureReason::Link
            }
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::Timeout => "timeout",
            FailureReason::InvalidFrame => "invalid frame",
            FailureReason::LinkWrite => "link write error",
            FailureReason::LinkRead => "link read error",
            FailureReason::SchemaMismatch => "schema mismatch",
            FailureReason::Encoding => "encoding error",
            FailureReason::Link => "link unavailable",
        };
        f.write_str(name)
    }
}

/// Outcome of a cycle that produced no reading
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} after {attempts} attempt(s): {detail}")]
pub struct CycleFailure {
    pub reason: FailureReason,
    /// Attempts made, including the failing one
    pub attempts: u32,
    /// Message of the last error
    pub detail: String,
}

impl CycleFailure {
    fn new(error: &TracerError, attempts: u32) -> Self {
        Self {
            reason: FailureReason::from(error),
            attempts,
            detail: error.to_string(),
        }
    }
}

/// Request/response driver for one controller
#[derive(Debug)]
pub struct PollLoop<T: StreamAccessor> {
    session: LinkSession<T>,
    address: u8,
    read_timeout: Duration,
    policy: RetryPolicy,
    decoder: FieldDecoder,
}

impl<T: StreamAccessor> PollLoop<T> {
    /// Create a poll loop over an opened session
    ///
    /// # Arguments
    /// * `session` - Link session, exclusively owned by the loop
    /// * `address` - Controller address
    /// * `read_timeout` - Receive budget of one attempt
    /// * `policy` - Retry budget of one cycle
    pub fn new(
        session: LinkSession<T>,
        address: u8,
        read_timeout: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            session,
            address,
            read_timeout,
            policy,
            decoder: FieldDecoder::new(),
        }
    }

    /// Run one real-time data cycle
    pub async fn run_cycle(&mut self) -> Result<Reading, CycleFailure> {
        self.execute(Command::ReadRealTime).await
    }

    /// Switch the load output and return the controller's acknowledgement
    pub async fn set_load(&mut self, on: bool) -> Result<LoadControlAck, CycleFailure> {
        let reading = self.execute(Command::SetLoad(on)).await?;
        match reading {
            Reading::LoadControl(ack) => Ok(ack),
            other => Err(CycleFailure {
                reason: FailureReason::SchemaMismatch,
                attempts: 1,
                detail: format!("expected a load control answer, got {:?}", other.function_code()),
            }),
        }
    }

    /// Run one cycle of `command`, retrying transient failures
    ///
    /// # Process
    /// 1. Encode the request; an encoding error fails the cycle at once
    /// 2. Send, receive the correlated response and decode it
    /// 3. On a transient error wait `retry_wait` and repeat step 2 until
    ///    the attempt budget is exhausted
    /// 4. A schema mismatch fails the cycle without retry
    pub async fn execute(&mut self, command: Command) -> Result<Reading, CycleFailure> {
        let request = command
            .to_request(self.address)
            .map_err(|e| CycleFailure::new(&e, 0))?;

        let attempts = self.policy.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            log::debug!("{}: attempt {} of {}", command, attempt, attempts);

            let error = match self.attempt(&request).await {
                Ok(reading) => return Ok(reading),
                Err(e) => e,
            };

            let failure = CycleFailure::new(&error, attempt);
            if !failure.reason.is_retryable() {
                log::warn!("{} failed: {}", command, failure);
                return Err(failure);
            }
            if attempt >= attempts {
                log::warn!("{} failed, giving up: {}", command, failure);
                return Err(failure);
            }

            log::info!(
                "{} failed on attempt {} of {}: {}",
                command,
                attempt,
                attempts,
                error
            );
            if !self.policy.retry_wait.is_zero() {
                tokio::time::sleep(self.policy.retry_wait).await;
            }
        }
    }

    /// One exchange; a timeout that only saw corrupted frames is reported
    /// as `FrameInvalid`
    async fn attempt(&mut self, request: &Frame) -> TracerResult<Reading> {
        self.session.send(request).await?;
        let rejected_before = self.session.statistics().frames_rejected;
        let response = match self
            .session
            .receive_response(request, self.read_timeout)
            .await
        {
            Ok(frame) => frame,
            Err(TracerError::Timeout) => {
                let rejected = self.session.statistics().frames_rejected - rejected_before;
                if rejected > 0 {
                    return Err(TracerError::FrameInvalid(format!(
                        "{} corrupted frame(s) and no valid response",
                        rejected
                    )));
                }
                return Err(TracerError::Timeout);
            }
            Err(e) => return Err(e),
        };
        self.decoder.decode_frame(&response)
    }

    /// Drain pending input for `quiet`, then close the link
    pub async fn shutdown(&mut self, quiet: Duration) -> TracerResult<()> {
        if let Err(e) = self.session.drain(quiet).await {
            log::debug!("drain before close failed: {}", e);
        }
        self.session.close().await
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn session(&self) -> &LinkSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut LinkSession<T> {
        &mut self.session
    }

    pub fn into_session(self) -> LinkSession<T> {
        self.session
    }
}
