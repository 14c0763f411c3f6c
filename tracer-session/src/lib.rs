//! Session layer module for the Tracer protocol
//!
//! This crate provides the frame codec, the CRC used to protect frames and
//! the link session that owns the byte stream, resynchronizes on the sync
//! marker and correlates responses with requests.

pub mod checksum;
pub mod decoder;
pub mod frame;
pub mod session;
pub mod state;
pub mod statistics;

pub use decoder::{try_decode_frame, DecodeOutcome, RejectReason};
pub use frame::{Frame, FrameKind, MAX_PAYLOAD_LENGTH, PREAMBLE, SYNC_MARKER, TRAILER};
pub use session::LinkSession;
pub use state::LinkState;
pub use statistics::LinkStatistics;
pub use tracer_core::{TracerError, TracerResult};
