//! Generic per-entity-type facade.
//!
//! Every read and mutation goes through here. Online, calls hit the remote
//! and the result is mirrored into the local store. Offline, mutations are
//! applied to the store and queued in the same transaction for later
//! replay by the orchestrator.

use crate::config::OnlineFailurePolicy;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::orchestrator::SyncOrchestrator;
use crate::remote::RemoteEndpoint;
use crate::report::SyncReport;
use fieldsync_storage::{RecordStore, SyncStore};
use fieldsync_types::{EntityType, NewOperation, Record, RecordId};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// CRUD facade for one entity type.
pub struct EntityService {
    entity_type: EntityType,
    store: Arc<dyn SyncStore>,
    remote: Arc<dyn RemoteEndpoint>,
    monitor: Arc<ConnectivityMonitor>,
    orchestrator: SyncOrchestrator,
    policy: OnlineFailurePolicy,
}

impl EntityService {
    pub fn new(
        store: Arc<dyn SyncStore>,
        remote: Arc<dyn RemoteEndpoint>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        let orchestrator = SyncOrchestrator::new(store.clone(), remote.clone(), monitor.clone());
        Self {
            entity_type: remote.entity_type(),
            store,
            remote,
            monitor,
            orchestrator,
            policy: OnlineFailurePolicy::default(),
        }
    }

    /// Sets what happens when an online mutation fails.
    pub fn with_policy(mut self, policy: OnlineFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn policy(&self) -> OnlineFailurePolicy {
        self.policy
    }

    /// All records of this type.
    ///
    /// Online, the remote list replaces the local table wholesale. If the
    /// remote fails, the local copy is returned instead; the remote error
    /// only surfaces when there is nothing local to show.
    pub async fn get_all(&self) -> SyncResult<Vec<Record>> {
        if self.monitor.is_online() {
            match self.remote.list().await {
                Ok(records) => {
                    self.store.replace_all(self.entity_type, &records).await?;
                    debug!("refreshed {} {} records", records.len(), self.entity_type);
                    return Ok(self.store.get_all(self.entity_type).await?);
                }
                Err(e) => {
                    warn!("remote list of {} failed, using local copy: {}", self.entity_type, e);
                    let local = self.store.get_all(self.entity_type).await?;
                    if local.is_empty() {
                        return Err(e);
                    }
                    return Ok(local);
                }
            }
        }
        Ok(self.store.get_all(self.entity_type).await?)
    }

    /// One record. Local ids of already-synced records are translated to
    /// their server ids.
    pub async fn get_by_id(&self, id: &RecordId) -> SyncResult<Record> {
        let id = self.store.resolve_id(self.entity_type, id).await?;
        if self.monitor.is_online() {
            match self.remote.get(&id).await {
                Ok(record) => {
                    self.store.save(self.entity_type, &record).await?;
                    return Ok(record);
                }
                Err(remote_err) => {
                    debug!("remote get of {} failed, trying local: {}", id, remote_err);
                    return match self.store.get_by_id(self.entity_type, &id).await {
                        Ok(record) => Ok(record),
                        Err(e) if e.is_not_found() => Err(remote_err),
                        Err(e) => Err(e.into()),
                    };
                }
            }
        }
        Ok(self.store.get_by_id(self.entity_type, &id).await?)
    }

    /// Creates a record from a JSON object of business fields.
    ///
    /// Online, returns the server copy. Offline, returns the local record
    /// under a client-generated id and queues a create.
    pub async fn create(&self, data: Value) -> SyncResult<Record> {
        let draft = Record::new_local(into_fields(data)?);

        if self.monitor.is_online() {
            match self.remote.create(&draft).await {
                Ok(created) => {
                    self.store.save(self.entity_type, &created).await?;
                    debug!("created {} {}", self.entity_type, created.id);
                    return Ok(created);
                }
                Err(e) if self.policy.should_queue(&e) => {
                    warn!("remote create failed, queuing instead: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        let op = NewOperation::create(self.entity_type, &draft);
        let pending = self.store.save_and_enqueue(self.entity_type, &draft, op).await?;
        debug!("queued {} for {} (op {})", pending.kind, draft.id, pending.id);
        self.request_sync_if_online();
        Ok(draft)
    }

    /// Shallow-merges `data` into an existing record.
    ///
    /// Offline, the record must exist locally; the full merged record is
    /// queued so the replay overwrites the remote copy as a whole. A record
    /// whose create is still queued is always updated this way, so the
    /// update replays after the create against the server id.
    pub async fn update(&self, id: &RecordId, data: Value) -> SyncResult<Record> {
        let patch = into_fields(data)?;
        let id = self.store.resolve_id(self.entity_type, id).await?;

        if self.monitor.is_online() && !self.awaits_create(&id).await? {
            let merged = match self.store.get_by_id(self.entity_type, &id).await {
                Ok(mut local) => {
                    local.merge(patch.clone());
                    local
                }
                Err(e) if e.is_not_found() => Record::new(id.clone(), patch.clone()),
                Err(e) => return Err(e.into()),
            };
            match self.remote.update(&merged).await {
                Ok(updated) => {
                    self.store.save(self.entity_type, &updated).await?;
                    return Ok(updated);
                }
                Err(e) if self.policy.should_queue(&e) => {
                    warn!("remote update of {} failed, queuing instead: {}", id, e);
                }
                Err(e) => return Err(e),
            }
        }

        let mut record = self.store.get_by_id(self.entity_type, &id).await?;
        record.merge(patch);
        let op = NewOperation::update(self.entity_type, &record);
        self.store.save_and_enqueue(self.entity_type, &record, op).await?;
        self.request_sync_if_online();
        Ok(record)
    }

    /// Deletes a record. Offline, or while its create is still queued, it
    /// disappears locally at once and a delete is queued.
    pub async fn delete(&self, id: &RecordId) -> SyncResult<()> {
        let id = self.store.resolve_id(self.entity_type, id).await?;

        if self.monitor.is_online() && !self.awaits_create(&id).await? {
            match self.remote.delete(&id).await {
                Ok(()) => {
                    RecordStore::remove(&*self.store, self.entity_type, &id).await?;
                    return Ok(());
                }
                Err(e) if self.policy.should_queue(&e) => {
                    warn!("remote delete of {} failed, queuing instead: {}", id, e);
                }
                Err(e) => return Err(e),
            }
        }

        let op = NewOperation::delete(self.entity_type, &id);
        self.store.remove_and_enqueue(self.entity_type, &id, op).await?;
        self.request_sync_if_online();
        Ok(())
    }

    /// Replays this type's queued operations.
    pub async fn sync_pending_operations(&self) -> SyncResult<SyncReport> {
        self.orchestrator.sync_pending_operations().await
    }

    /// True while the create for `id` is still queued, so the remote does
    /// not know the record yet.
    async fn awaits_create(&self, id: &RecordId) -> SyncResult<bool> {
        Ok(self.store.has_pending_create(self.entity_type, id).await?)
    }

    /// Work queued while online would otherwise wait for the next
    /// reconnection.
    fn request_sync_if_online(&self) {
        if self.monitor.is_online() {
            self.monitor.request_sync();
        }
    }

    /// Number of queued operations for this type.
    pub async fn pending_count(&self) -> SyncResult<usize> {
        let ops = self.store.list_all().await?;
        Ok(ops
            .iter()
            .filter(|op| op.entity_type() == self.entity_type)
            .count())
    }
}

fn into_fields(data: Value) -> SyncResult<Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(SyncError::ValidationFailed(format!(
            "record data must be a JSON object, got {other}"
        ))),
    }
}
