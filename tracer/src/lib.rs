//! Tracer - polling bridge for EPsolar Tracer solar charge controllers
//!
//! Talks the controller's remote-meter protocol over a serial line or a TCP
//! serial server and turns its real-time data into host records.
//!
//! # Architecture
//!
//! - `tracer-core`: error type, function codes, validity-tagged measurements
//! - `tracer-transport`: byte-stream transports (serial, TCP, scripted)
//! - `tracer-session`: framing, CRC, resynchronization, link session
//! - `tracer-application`: commands, payload schemas, readings
//! - `tracer-client`: poll loop, retries, scheduling, configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tracer::{PollLoop, RetryPolicy, SessionBuilder};
//!
//! # async fn demo() -> tracer::TracerResult<()> {
//! let session = SessionBuilder::new().serial("/dev/ttyUSB0", 9600).open().await?;
//! let mut poll = PollLoop::new(session, 0x01, Duration::from_secs(6), RetryPolicy::default());
//! match poll.run_cycle().await {
//!     Ok(reading) => println!("{}", reading),
//!     Err(failure) => eprintln!("{}", failure),
//! }
//! # Ok(())
//! # }
//! ```

pub use tracer_application;
pub use tracer_client;
pub use tracer_core;
pub use tracer_session;
pub use tracer_transport;

pub use tracer_application::{Command, FieldDecoder, FieldValue, Reading};
pub use tracer_client::{
    CycleFailure, FailureReason, LoggingConsumer, PollLoop, PollerConfig, Record,
    RecordConsumer, RetryPolicy, Scheduler, SensorMap, SessionBuilder,
};
pub use tracer_core::{FunctionCode, Measurement, TracerError, TracerResult, Validity};
pub use tracer_session::{Frame, LinkSession};

/// Version reported at startup and by `--version`
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");
