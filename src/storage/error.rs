//! Measurement store error types
//!
//! Defines all errors that can occur while reading station telemetry.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the measurement store layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing store could not be reached (closed, locked, cannot open)
    #[error("Measurement store unavailable: {0}")]
    Unavailable(String),

    /// A single store call exceeded its deadline
    #[error("Measurement store call timed out after {0:?}")]
    Timeout(Duration),

    /// Retries were exhausted on a transient failure
    #[error("Measurement store unavailable after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },

    /// Query or schema failure reported by the database
    #[error("Database error: {0}")]
    Database(String),

    /// Stored row could not be interpreted
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the adapter should retry the call that produced this error
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }

    /// Whether this error means the store could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_)
                | StoreError::Timeout(_)
                | StoreError::RetriesExhausted { .. }
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy)
            | Some(ErrorCode::DatabaseLocked)
            | Some(ErrorCode::CannotOpen) => StoreError::Unavailable(err.to_string()),
            _ => match err {
                rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..) => {
                    StoreError::Corruption(err.to_string())
                }
                _ => StoreError::Database(err.to_string()),
            },
        }
    }
}

/// Result type alias for measurement store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Unavailable("connection closed".to_string());
        assert_eq!(
            err.to_string(),
            "Measurement store unavailable: connection closed"
        );

        let err = StoreError::RetriesExhausted {
            attempts: 4,
            reason: "locked".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Measurement store unavailable after 4 attempts: locked"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Unavailable("x".into()).is_transient());
        assert!(StoreError::Timeout(Duration::from_millis(5)).is_transient());
        assert!(!StoreError::Database("syntax".into()).is_transient());
        assert!(!StoreError::Corruption("bad".into()).is_transient());

        let exhausted = StoreError::RetriesExhausted {
            attempts: 3,
            reason: "x".into(),
        };
        assert!(!exhausted.is_transient());
        assert!(exhausted.is_unavailable());
    }

    #[test]
    fn test_sqlite_type_mismatch_is_corruption() {
        let err: StoreError =
            rusqlite::Error::InvalidColumnType(2, "value".to_string(), rusqlite::types::Type::Text).into();
        assert!(matches!(err, StoreError::Corruption(_)));
        assert!(!err.is_unavailable());

        let err: StoreError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }
}
