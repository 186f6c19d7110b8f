//! Statistics error types
//!
//! The error surface of `compute_statistics` and the other service
//! operations. "No data" is not an error: it is an absent statistic inside
//! an otherwise normal result.

use thiserror::Error;

use crate::index::IndexError;
use crate::storage::StoreError;

/// Errors that can occur while computing regional statistics
#[derive(Error, Debug)]
pub enum StatsError {
    /// Unknown region id or name, not retried
    #[error("Region not found: {0}")]
    RegionNotFound(String),

    /// Region name matches several units
    #[error("Region name '{name}' is ambiguous, use one of: {}", .candidates.join(", "))]
    AmbiguousRegion { name: String, candidates: Vec<String> },

    /// Measurement store unreachable after the adapter's retries
    #[error("Measurement store unavailable: {0}")]
    Unavailable(String),

    /// Non-transient store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Geometry could not be loaded
    #[error("Index error: {0}")]
    Index(String),

    /// Invalid request or configuration
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl StatsError {
    /// Whether a later retry may succeed
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StatsError::Unavailable(_))
    }
}

impl From<StoreError> for StatsError {
    fn from(err: StoreError) -> Self {
        if err.is_unavailable() {
            StatsError::Unavailable(err.to_string())
        } else {
            StatsError::Storage(err.to_string())
        }
    }
}

impl From<IndexError> for StatsError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::UnitNotFound(key) => StatsError::RegionNotFound(key),
            IndexError::AmbiguousUnit { name, candidates } => {
                StatsError::AmbiguousRegion { name, candidates }
            }
            other => StatsError::Index(other.to_string()),
        }
    }
}

/// Result type for statistics operations
pub type StatsResult<T> = Result<T, StatsError>;
