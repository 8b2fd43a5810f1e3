// Error types for the reporting backends
//
// These never leave the crate's public operations: adapters and constructors
// use them internally, and the dispatcher logs and drops them.

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Errors that can occur while configuring or talking to a reporting service
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Backend configuration is invalid (bad DSN, missing key, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request never got a response
    #[error("Connection error: {0}")]
    Connection(String),

    /// The service answered with a non-success status
    #[error("Export error: HTTP {status}: {body}")]
    Export { status: u16, body: String },

    /// A payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Reading or writing the local identity file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        AnalyticsError::Config(msg.into())
    }
}

impl From<reqwest::Error> for AnalyticsError {
    fn from(e: reqwest::Error) -> Self {
        AnalyticsError::Connection(e.to_string())
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        AnalyticsError::Serialization(e.to_string())
    }
}
