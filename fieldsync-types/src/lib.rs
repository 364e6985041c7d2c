//! Core type definitions for fieldsync.
//!
//! This crate defines the plain data shared by the store, the queue and the
//! sync layer:
//! - Entity types and record identifiers (server-issued or client-generated)
//! - Millisecond timestamps
//! - Business records as flat JSON objects
//! - Pending operations (deferred create/update/delete intents)
//!
//! Nothing here performs I/O.

mod ids;
mod operation;
mod record;
mod timestamp;

pub use ids::{EntityType, OperationId, RecordId};
pub use operation::{
    NewOperation, OperationAction, OperationKind, PendingOperation, sort_for_replay,
};
pub use record::{RESERVED_FIELDS, Record};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("invalid operation type: {0}")]
    InvalidOperationType(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
