//! Application layer for the Tracer protocol
//!
//! This crate knows what the controller's commands mean: how requests are
//! parameterized and how response payloads map onto typed readings.

pub mod command;
pub mod decoder;
pub mod reading;
pub mod schema;

pub use command::Command;
pub use decoder::FieldDecoder;
pub use reading::{FieldValue, LoadControlAck, RealTimeData, Reading};
pub use schema::{FieldKind, FieldSpec, LOAD_CONTROL_PAYLOAD_LENGTH, REAL_TIME_PAYLOAD_LENGTH};
