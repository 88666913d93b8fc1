//! # Error Types
//!
//! Custom error types for QSP Link using `thiserror`.

use thiserror::Error;

/// Main error type for QSP Link
#[derive(Debug, Error)]
pub enum QspError {
    /// QSP protocol errors
    #[error("QSP protocol error: {0}")]
    Protocol(String),

    /// Payload handed to a decoder is shorter than its frame type requires
    #[error("{frame} payload too short: expected {expected} bytes, got {actual}")]
    PayloadTooShort {
        frame: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Telemetry record serialization errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] serde_json::Error),
}

/// Result type alias for QSP Link
pub type Result<T> = std::result::Result<T, QspError>;
