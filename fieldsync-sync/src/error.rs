//! Error types for the sync layer.

use fieldsync_storage::StorageError;
use fieldsync_types::{EntityType, RecordId};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local database could not be read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Record not found, locally or remotely.
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: EntityType, id: RecordId },

    /// The remote rejected the bearer credential (HTTP 401).
    #[error("unauthorized: {0}")]
    RemoteUnauthorized(String),

    /// The remote answered with a non-success status.
    #[error("remote request failed ({status}): {message}")]
    RemoteRequestFailed { status: u16, message: String },

    /// The remote could not be reached at all.
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The payload was rejected as invalid, locally or remotely.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The remote answered 2xx with a body we cannot interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The record's create is still queued, so the remote does not know
    /// its id yet.
    #[error("{entity_type} {id} has not been created remotely yet")]
    AwaitingCreate { entity_type: EntityType, id: RecordId },

    /// Sync was requested while the connectivity monitor reports offline.
    #[error("cannot sync while offline")]
    Offline,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Returns true for failures that may succeed if simply retried later:
    /// an unreachable network, a 5xx, a 408 or a 429.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::NetworkUnreachable(_) => true,
            SyncError::RemoteRequestFailed { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// Returns true if this is a missing-record error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }
}

impl From<StorageError> for SyncError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { entity_type, id } => SyncError::NotFound { entity_type, id },
            other => SyncError::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<fieldsync_types::Error> for SyncError {
    fn from(e: fieldsync_types::Error) -> Self {
        SyncError::ValidationFailed(e.to_string())
    }
}
