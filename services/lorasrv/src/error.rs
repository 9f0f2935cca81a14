//! Error handling for the LoRa gateway service
//!
//! Per-stage error types mirror the ingestion pipeline: radio, framing,
//! validation, persistence. Only `LoraSrvError` ever reaches `main`.

use std::time::Duration;
use thiserror::Error;

/// Radio link errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// Nothing arrived within the receive window
    #[error("No frame received within {0:?}")]
    Timeout(Duration),

    /// The transport failed or was closed; not retried within a cycle
    #[error("Radio channel error: {0}")]
    Channel(String),
}

/// Frame parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed frame ({reason}): {raw_frame:?}")]
    MalformedFrame { raw_frame: String, reason: String },
}

impl ParseError {
    pub(crate) fn malformed(raw_frame: &str, reason: impl Into<String>) -> Self {
        ParseError::MalformedFrame {
            raw_frame: raw_frame.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why a parsed frame did not become a Reading
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RejectionReason {
    #[error("Field {name} is not numeric: {raw_value:?}")]
    NotNumeric { name: String, raw_value: String },

    #[error("Field {name} value {value} out of range [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Required field {name} missing from frame")]
    MissingField { name: String },

    #[error("Frame from unexpected device {actual} (expected {expected})")]
    UnexpectedDevice { expected: String, actual: String },
}

/// Sink write errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Log sink I/O failure
    #[error("Log sink I/O error: {0}")]
    Io(String),

    /// Time-series database failure
    #[error("Time-series database error: {0}")]
    Db(String),
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err.to_string())
    }
}

/// Service-level errors
#[derive(Error, Debug)]
pub enum LoraSrvError {
    /// Configuration loading or validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid field mapping table
    #[error("Invalid field table: {0}")]
    FieldTable(String),

    /// Radio adapter could not be opened or configured
    #[error("Radio setup failed: {0}")]
    RadioSetup(String),

    /// Sink adapter could not be created
    #[error("Storage setup failed: {0}")]
    StorageSetup(String),

    /// Handshake timed out for too many cycles in a row
    #[error("Handshake failed for {0} consecutive cycles")]
    HandshakeFailuresExceeded(u32),
}

impl From<figment::Error> for LoraSrvError {
    fn from(err: figment::Error) -> Self {
        LoraSrvError::Config(err.to_string())
    }
}

/// Result type alias for the gateway service
pub type Result<T> = std::result::Result<T, LoraSrvError>;
