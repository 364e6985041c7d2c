//! Remote endpoint abstraction.
//!
//! One endpoint per entity type. Implementations translate transport
//! failures into [`SyncError`](crate::SyncError) variants so callers can
//! tell an unreachable network from a rejected payload.

mod http;
pub mod mock;

pub use http::{HttpRemote, build_client};

use crate::error::SyncResult;
use async_trait::async_trait;
use fieldsync_types::{EntityType, Record, RecordId};

/// CRUD surface of the remote service for one entity type.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    /// The entity type served by this endpoint.
    fn entity_type(&self) -> EntityType;

    /// Every record the remote holds.
    async fn list(&self) -> SyncResult<Vec<Record>>;

    /// One record; `NotFound` if the remote has no such id.
    async fn get(&self, id: &RecordId) -> SyncResult<Record>;

    /// Creates a record and returns the server copy under its server id.
    async fn create(&self, record: &Record) -> SyncResult<Record>;

    /// Replaces a record (last write wins) and returns the server copy.
    async fn update(&self, record: &Record) -> SyncResult<Record>;

    /// Deletes a record. Deleting an absent record succeeds.
    async fn delete(&self, id: &RecordId) -> SyncResult<()>;
}
