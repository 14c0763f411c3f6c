//! Transport layer module for the Tracer protocol
//!
//! This crate provides the byte-stream abstraction the session layer runs on,
//! plus transports that open a serial port or a TCP serial-server bridge.
//! Any already-open tokio duplex stream can be used through [`IoTransport`].

pub mod io;
pub mod scripted;
pub mod serial;
pub mod stream;
pub mod tcp;

pub use io::IoTransport;
pub use scripted::{ReadEvent, ScriptedTransport};
pub use serial::{SerialSettings, SerialTransport};
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
pub use tracer_core::{TracerError, TracerResult};
