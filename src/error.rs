//! Error types for the path-search engine.
//!
//! Recursive search never raises: an unreachable branch is a sentinel, and an
//! empty result is a valid result. Only bad call parameters and structural
//! mismatches detected during mutation surface here.

use thiserror::Error;

/// Result type alias for kspa operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid call parameters. Fatal to the call, no partial result.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A mutation addressed a merged edge or member that no longer exists.
    #[error("stale structure: quote '{external_id}' on {origin} -> {destination} not found")]
    StaleStructure {
        origin: i64,
        destination: i64,
        external_id: String,
    },

    /// Dense vertex indices would not fit in the memo key.
    #[error("vertex count {count} exceeds representable range {max}")]
    IdOutOfRange { count: usize, max: usize },

    /// Rates must be positive and finite for -ln(rate) to be a weight.
    #[error("invalid rate {rate} for quote '{external_id}'")]
    InvalidRate { external_id: String, rate: f64 },

    /// An edge-list row that cannot be read as a quote.
    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}
