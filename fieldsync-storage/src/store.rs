//! Storage contracts used by the sync layer.

use crate::StorageResult;
use async_trait::async_trait;
use fieldsync_types::{EntityType, NewOperation, OperationId, PendingOperation, Record, RecordId};

/// Durable per-entity-type record table keyed by id.
///
/// Never queues anything itself; queuing decisions belong to callers.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records of a type, oldest first.
    async fn get_all(&self, entity_type: EntityType) -> StorageResult<Vec<Record>>;

    /// One record; fails with `NotFound` if absent.
    async fn get_by_id(&self, entity_type: EntityType, id: &RecordId) -> StorageResult<Record>;

    /// Full-replace upsert.
    async fn save(&self, entity_type: EntityType, record: &Record) -> StorageResult<()>;

    /// Upserts several records in one transaction.
    async fn save_many(&self, entity_type: EntityType, records: &[Record]) -> StorageResult<()>;

    /// Removes a record. Returns whether it existed.
    async fn remove(&self, entity_type: EntityType, id: &RecordId) -> StorageResult<bool>;

    /// Replaces the whole table with `records` in one transaction.
    async fn replace_all(&self, entity_type: EntityType, records: &[Record]) -> StorageResult<()>;

    /// Number of records of a type.
    async fn count(&self, entity_type: EntityType) -> StorageResult<usize>;
}

/// Durable ordered log of mutation intents.
///
/// Opaque to operation semantics. Ordering under concurrent enqueuers is not
/// guaranteed; consumers sort by timestamp.
#[async_trait]
pub trait OperationQueue: Send + Sync {
    /// Appends an operation, assigning its id and timestamp.
    async fn enqueue(&self, op: NewOperation) -> StorageResult<PendingOperation>;

    /// Every queued operation in insertion order.
    async fn list_all(&self) -> StorageResult<Vec<PendingOperation>>;

    /// Removes one operation. Returns whether it existed.
    async fn remove(&self, id: OperationId) -> StorageResult<bool>;

    /// Drops every queued operation. Returns how many were removed.
    async fn clear(&self) -> StorageResult<usize>;

    /// Number of queued operations.
    async fn len(&self) -> StorageResult<usize>;

    async fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Sets the transient in-flight marker.
    async fn set_processing(&self, id: OperationId, processing: bool) -> StorageResult<()>;

    /// Clears markers left behind by an interrupted run. Returns how many
    /// operations were reset.
    async fn reset_processing(&self) -> StorageResult<usize>;
}

/// What to do with the local copy when a queued operation is confirmed.
#[derive(Debug, Clone, PartialEq)]
pub enum Mirror {
    /// Leave the record table alone.
    Nothing,
    /// Upsert the server's copy.
    Save(Record),
    /// Drop the record.
    Remove(RecordId),
}

/// Mutations spanning the record table and the queue, each committed as one
/// transaction, plus the local-id to server-id index.
#[async_trait]
pub trait SyncStore: RecordStore + OperationQueue {
    /// Writes a record and queues the operation that will replay it.
    async fn save_and_enqueue(
        &self,
        entity_type: EntityType,
        record: &Record,
        op: NewOperation,
    ) -> StorageResult<PendingOperation>;

    /// Removes a record and queues the operation that will replay it.
    async fn remove_and_enqueue(
        &self,
        entity_type: EntityType,
        id: &RecordId,
        op: NewOperation,
    ) -> StorageResult<PendingOperation>;

    /// Confirms a queued create: dequeues it, swaps the local record for the
    /// server copy and records the id mapping. The server copy is not
    /// written if a delete for the record is still queued.
    async fn complete_create(
        &self,
        op_id: OperationId,
        entity_type: EntityType,
        local_id: &RecordId,
        server_record: &Record,
    ) -> StorageResult<()>;

    /// Confirms a queued update or delete: dequeues it and applies `mirror`.
    /// A `Mirror::Save` is skipped if a delete for the record is still queued.
    async fn complete_operation(
        &self,
        op_id: OperationId,
        entity_type: EntityType,
        mirror: Mirror,
    ) -> StorageResult<()>;

    /// Translates a local id to its confirmed server id; other ids pass
    /// through unchanged.
    async fn resolve_id(&self, entity_type: EntityType, id: &RecordId) -> StorageResult<RecordId>;

    /// Returns true if a create for `local_id` was already confirmed.
    async fn is_confirmed(&self, entity_type: EntityType, local_id: &RecordId)
        -> StorageResult<bool>;

    /// Returns true while a create for `id` is still queued.
    async fn has_pending_create(&self, entity_type: EntityType, id: &RecordId)
        -> StorageResult<bool>;
}
