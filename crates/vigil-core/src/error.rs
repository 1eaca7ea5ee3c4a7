// crates/vigil-core/src/error.rs

use thiserror::Error;

/// Engine-wide error types for Vigil.
///
/// "Not enough data yet" is deliberately absent: an under-populated window is
/// a normal resolution outcome, not a failure.
#[derive(Debug, Error)]
pub enum VigilError {
    /// Referenced report, target, or node does not exist in the relevant store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A precondition was violated. Always raised before any mutation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid parameter combination, rejected at configuration time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A report failed structural validation (e.g. unrecognised status code).
    #[error("Invalid report: {0}")]
    InvalidReport(String),

    /// Storage layer error (RocksDB).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for VigilError {
    fn from(e: serde_json::Error) -> Self {
        VigilError::Serialization(e.to_string())
    }
}
