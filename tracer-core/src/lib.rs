//! Core types and utilities for the Tracer charge-controller protocol
//!
//! This crate provides the error taxonomy, protocol function codes and the
//! validity-tagged measurement type shared by every other layer.

pub mod error;
pub mod function_code;
pub mod measurement;

pub use error::{TracerError, TracerResult};
pub use function_code::FunctionCode;
pub use measurement::{Measurement, Validity};
