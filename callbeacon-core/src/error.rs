//! Error types for callbeacon-core
//!
//! None of these ever reach code that calls [`TelemetryClient::submit`];
//! they flow between the internal stages and are logged at the boundary.
//!
//! [`TelemetryClient::submit`]: crate::telemetry::TelemetryClient::submit

use thiserror::Error;

/// Main error type for the callbeacon-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Collection sink rejected or failed the upload
    #[error("transport error: {0}")]
    Transport(String),

    /// Time authority unreachable or returned an unusable answer
    #[error("clock source error: {0}")]
    ClockSource(String),
}

/// Result type alias for callbeacon-core
pub type Result<T> = std::result::Result<T, Error>;
