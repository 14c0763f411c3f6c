//! Link receive state machine

use std::fmt;
use tracer_core::{TracerError, TracerResult};

/// Receive state of a link session
///
/// # State Transitions
/// ```text
/// Idle -> AwaitingSync (request sent)
/// AwaitingSync -> AwaitingPayload (sync marker seen, frame incomplete)
/// AwaitingSync | AwaitingPayload -> Validating (complete candidate)
/// Validating -> AwaitingSync (candidate rejected)
/// any -> Idle (frame delivered, timeout or link error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No exchange in progress
    #[default]
    Idle,
    /// Scanning the stream for a sync marker
    AwaitingSync,
    /// Sync marker found, waiting for the rest of the frame
    AwaitingPayload,
    /// Checking checksum and trailer of a complete candidate
    Validating,
}

impl LinkState {
    /// Whether a request is outstanding
    pub fn is_receiving(&self) -> bool {
        !matches!(self, LinkState::Idle)
    }

    /// Validate state transition
    ///
    /// # Errors
    /// Returns `TracerError::InvalidData` for a transition the receive loop
    /// never takes.
    pub fn validate_transition(&self, new_state: LinkState) -> TracerResult<()> {
        let valid = match (*self, new_state) {
            (_, LinkState::Idle) => true,
            (LinkState::Idle, LinkState::AwaitingSync) => true,
            (LinkState::AwaitingSync, LinkState::AwaitingSync) => true,
            (LinkState::AwaitingSync, LinkState::AwaitingPayload) => true,
            (LinkState::AwaitingSync, LinkState::Validating) => true,
            (LinkState::AwaitingPayload, LinkState::AwaitingPayload) => true,
            (LinkState::AwaitingPayload, LinkState::AwaitingSync) => true,
            (LinkState::AwaitingPayload, LinkState::Validating) => true,
            (LinkState::Validating, LinkState::AwaitingSync) => true,
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(TracerError::InvalidData(format!(
                "Invalid link state transition: {:?} -> {:?}",
                self, new_state
            )))
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Idle => "Idle",
            LinkState::AwaitingSync => "AwaitingSync",
            LinkState::AwaitingPayload => "AwaitingPayload",
            LinkState::Validating => "Validating",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
