//! Frame decoder with resynchronization
//!
//! The decoder never trusts buffer alignment. It scans byte by byte for the
//! sync marker and, when a candidate fails validation, tells the caller to
//! drop only the first byte of that candidate so that a genuine frame
//! starting inside the rejected bytes is still found.

use crate::checksum;
use crate::frame::{Frame, FRAME_OVERHEAD, HEADER_LENGTH, SYNC_MARKER, TRAILER};

/// Why bytes at the head of the buffer were rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Bytes that cannot be the start of a sync marker
    Garbage,
    /// Checksum mismatch
    Checksum { expected: u16, received: u16 },
    /// Checksum matched but the trailer byte is wrong
    Trailer(u8),
    /// Incomplete candidate while a complete, valid frame follows it
    Superseded,
}

/// Result of one decode attempt over the head of a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A valid frame occupying the first `consumed` bytes
    Frame { frame: Frame, consumed: usize },
    /// The buffer holds at most the beginning of a frame
    NeedMoreBytes,
    /// The first `discard` bytes must be dropped before decoding again
    InvalidFrame { discard: usize, reason: RejectReason },
}

enum Candidate {
    Complete(DecodeOutcome),
    Incomplete,
}

/// Try to decode one frame from the start of `raw`
///
/// Call repeatedly, dropping `discard` bytes after every `InvalidFrame`,
/// until a frame is returned or more input is needed.
pub fn try_decode_frame(raw: &[u8]) -> DecodeOutcome {
    match find_sync(raw) {
        Some(0) => {}
        Some(offset) => {
            return DecodeOutcome::InvalidFrame {
                discard: offset,
                reason: RejectReason::Garbage,
            };
        }
        None => {
            let garbage = raw.len() - partial_sync_suffix(raw);
            return if garbage > 0 {
                DecodeOutcome::InvalidFrame {
                    discard: garbage,
                    reason: RejectReason::Garbage,
                }
            } else {
                DecodeOutcome::NeedMoreBytes
            };
        }
    }

    match decode_at_sync(raw) {
        Candidate::Complete(outcome) => outcome,
        Candidate::Incomplete if valid_frame_follows(raw) => DecodeOutcome::InvalidFrame {
            discard: 1,
            reason: RejectReason::Superseded,
        },
        Candidate::Incomplete => DecodeOutcome::NeedMoreBytes,
    }
}

fn find_sync(raw: &[u8]) -> Option<usize> {
    raw.windows(SYNC_MARKER.len())
        .position(|window| window == SYNC_MARKER)
}

/// Length of the longest buffer suffix that is a proper prefix of the marker
fn partial_sync_suffix(raw: &[u8]) -> usize {
    let longest = (SYNC_MARKER.len() - 1).min(raw.len());
    (1..=longest)
        .rev()
        .find(|&n| raw[raw.len() - n..] == SYNC_MARKER[..n])
        .unwrap_or(0)
}

/// Decode a candidate that starts with a complete sync marker
fn decode_at_sync(raw: &[u8]) -> Candidate {
    let header_end = SYNC_MARKER.len() + HEADER_LENGTH;
    if raw.len() < header_end {
        return Candidate::Incomplete;
    }

    let address = raw[SYNC_MARKER.len()];
    let function_code = raw[SYNC_MARKER.len() + 1];
    let length = raw[SYNC_MARKER.len() + 2] as usize;
    let total = FRAME_OVERHEAD + length;
    if raw.len() < total {
        return Candidate::Incomplete;
    }

    let checksum_pos = header_end + length;
    let covered = &raw[SYNC_MARKER.len()..checksum_pos];
    let received = checksum::from_bytes([raw[checksum_pos], raw[checksum_pos + 1]]);
    if !checksum::verify(covered, received) {
        return Candidate::Complete(DecodeOutcome::InvalidFrame {
            discard: 1,
            reason: RejectReason::Checksum {
                expected: checksum::compute(covered),
                received,
            },
        });
    }

    let trailer = raw[total - 1];
    if trailer != TRAILER {
        return Candidate::Complete(DecodeOutcome::InvalidFrame {
            discard: 1,
            reason: RejectReason::Trailer(trailer),
        });
    }

    let frame = Frame::from_validated(
        address,
        function_code.into(),
        raw[header_end..checksum_pos].to_vec(),
        received,
    );
    Candidate::Complete(DecodeOutcome::Frame {
        frame,
        consumed: total,
    })
}

/// Whether a later sync marker in `raw` opens a complete, valid frame
///
/// Keeps a corrupted length byte from stalling the stream: the bogus
/// candidate would otherwise wait for bytes that belong to the next frame.
fn valid_frame_follows(raw: &[u8]) -> bool {
    (1..raw.len())
        .filter(|&i| raw[i..].starts_with(&SYNC_MARKER))
        .any(|i| {
            matches!(
                decode_at_sync(&raw[i..]),
                Candidate::Complete(DecodeOutcome::Frame { .. })
            )
        })
}
