use thiserror::Error;

/// Main error type for Tracer protocol operations
#[derive(Error, Debug)]
pub enum TracerError {
    /// Request parameters do not fit the protocol's field widths
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Writing to the link failed or was cut short
    #[error("Link write error: {0}")]
    LinkWrite(#[source] std::io::Error),

    /// Reading from the link failed or the stream was closed
    #[error("Link read error: {0}")]
    LinkRead(#[source] std::io::Error),

    #[error("Timeout")]
    Timeout,

    /// Only corrupted frames arrived before the response deadline
    #[error("Frame invalid: {0}")]
    FrameInvalid(String),

    /// Payload shape does not match the schema of its function code
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Opening or closing the underlying transport failed
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),
}

/// Result type alias for Tracer operations
pub type TracerResult<T> = Result<T, TracerError>;
