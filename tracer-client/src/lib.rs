//! Polling client for Tracer charge controllers
//!
//! Ties the layers together: a [`SessionBuilder`] opens the link, a
//! [`PollLoop`] runs request/response cycles with bounded retries, and a
//! [`Scheduler`] paces the cycles and hands [`Record`]s to a
//! [`RecordConsumer`].

pub mod builder;
pub mod config;
pub mod consumer;
pub mod poll;
pub mod scheduler;

pub use builder::{LinkTransport, SessionBuilder};
pub use config::PollerConfig;
pub use consumer::{LoggingConsumer, Record, RecordConsumer, SensorMap, UnitSystem};
pub use poll::{CycleFailure, FailureReason, PollLoop, RetryPolicy};
pub use scheduler::{RunSummary, Scheduler};
