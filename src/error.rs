//! # Error Types
//!
//! Custom error types for Telemetry Ingest using `thiserror`.

use thiserror::Error;

/// Main error type for Telemetry Ingest
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Listening socket could not be created or bound (fatal at startup)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Bound socket could not be switched to listening mode (fatal at startup)
    #[error("Failed to listen on {addr} (backlog {backlog}): {source}")]
    Listen {
        addr: String,
        backlog: u32,
        #[source]
        source: std::io::Error,
    },

    /// Frame payload could not be decoded
    #[error("Frame decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Payload exceeded the configured maximum frame size
    #[error("Frame too large: more than {max} bytes received")]
    FrameTooLarge { max: usize },

    /// Peer sent nothing before the read timeout elapsed
    #[error("No data received within {timeout_ms}ms")]
    ReadTimeout { timeout_ms: u64 },

    /// Outbound probe connection failed
    #[error("Failed to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a raw payload is rejected by the frame decoder
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Nothing but whitespace was received
    #[error("empty payload")]
    Empty,

    /// A line break inside the payload would split it across log rows
    #[error("payload contains a line break")]
    EmbeddedNewline,

    /// Payload bytes are not valid UTF-8
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// Wrong number of comma-separated fields
    #[error("expected {expected} fields, found {found}")]
    FieldCountMismatch { expected: usize, found: usize },

    /// A field does not parse as a decimal number
    #[error("field {index} is not numeric: {token:?}")]
    NotNumeric { index: usize, token: String },
}

/// Result type alias for Telemetry Ingest
pub type Result<T> = std::result::Result<T, TelemetryError>;
