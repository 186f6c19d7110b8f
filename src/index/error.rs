//! Geospatial index error types

use thiserror::Error;

/// Errors that can occur while building or querying the geospatial index
#[derive(Error, Debug)]
pub enum IndexError {
    /// No unit with this id or name
    #[error("Administrative unit not found: {0}")]
    UnitNotFound(String),

    /// Name shared by several units
    #[error("Administrative unit name '{name}' is ambiguous, use one of: {}", .candidates.join(", "))]
    AmbiguousUnit { name: String, candidates: Vec<String> },

    /// Two units with the same id
    #[error("Duplicate administrative unit id: {0}")]
    DuplicateUnit(String),

    /// Two stations with the same id
    #[error("Duplicate station id: {0}")]
    DuplicateStation(String),

    /// Unknown level name
    #[error("Invalid unit level: {0}")]
    InvalidLevel(String),

    /// Document store failure
    #[error("Database error: {0}")]
    Database(String),

    /// Stored boundary could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        IndexError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexError::UnitNotFound("powiat atlantycki".to_string());
        assert_eq!(
            err.to_string(),
            "Administrative unit not found: powiat atlantycki"
        );

        let err = IndexError::AmbiguousUnit {
            name: "powiat bielski".to_string(),
            candidates: vec!["0203".to_string(), "2402".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Administrative unit name 'powiat bielski' is ambiguous, use one of: 0203, 2402"
        );
    }
}
