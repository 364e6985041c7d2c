//! Error types for the storage layer.

use fieldsync_types::{EntityType, RecordId};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database could not be reached (open, lock or task failure).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Record not found.
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: EntityType, id: RecordId },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data that no longer parses.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Returns true if this is a missing-record error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<fieldsync_types::Error> for StorageError {
    fn from(e: fieldsync_types::Error) -> Self {
        StorageError::InvalidData(e.to_string())
    }
}
