//! Replays queued operations for one entity type against its remote.
//!
//! Operations are applied one at a time in creation order. A failed
//! operation stays queued and does not stop the batch; the caller only
//! sees the aggregate counts.

use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteEndpoint;
use crate::report::SyncReport;
use fieldsync_storage::{Mirror, SyncStore};
use fieldsync_types::{
    EntityType, OperationAction, PendingOperation, RecordId, sort_for_replay,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Drains the pending queue for one entity type.
pub struct SyncOrchestrator {
    entity_type: EntityType,
    store: Arc<dyn SyncStore>,
    remote: Arc<dyn RemoteEndpoint>,
    monitor: Arc<ConnectivityMonitor>,
    run_lock: Mutex<()>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn SyncStore>,
        remote: Arc<dyn RemoteEndpoint>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            entity_type: remote.entity_type(),
            store,
            remote,
            monitor,
            run_lock: Mutex::new(()),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Replays every queued operation of this entity type.
    ///
    /// Fails with [`SyncError::Offline`] without touching the remote when the
    /// monitor reports offline. Concurrent calls run one after the other;
    /// the later one sees whatever the earlier one left queued.
    pub async fn sync_pending_operations(&self) -> SyncResult<SyncReport> {
        if !self.monitor.is_online() {
            return Err(SyncError::Offline);
        }
        let _run = self.run_lock.lock().await;

        let mut ops: Vec<PendingOperation> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|op| op.entity_type() == self.entity_type)
            .collect();
        sort_for_replay(&mut ops);

        let mut report = SyncReport::new(ops.len());
        if ops.is_empty() {
            debug!("no pending {} operations", self.entity_type);
            return Ok(report);
        }
        info!("syncing {} pending {} operations", ops.len(), self.entity_type);

        for op in &ops {
            match self.replay(op).await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    warn!("failed to sync {} (op {}): {}", op.kind, op.id, e);
                    if let Err(e) = self.store.set_processing(op.id, false).await {
                        warn!("could not clear processing marker on op {}: {}", op.id, e);
                    }
                    report.errors += 1;
                }
            }
        }

        info!("{} sync finished: {}", self.entity_type, report);
        Ok(report)
    }

    async fn replay(&self, op: &PendingOperation) -> SyncResult<()> {
        let entity_type = self.entity_type;
        self.store.set_processing(op.id, true).await?;

        match op.action() {
            OperationAction::Create => {
                let record = op.record()?;
                if self.store.is_confirmed(entity_type, &record.id).await? {
                    debug!("create of {} already confirmed, dequeuing", record.id);
                    self.store
                        .complete_operation(op.id, entity_type, Mirror::Nothing)
                        .await?;
                    return Ok(());
                }
                let created = self.remote.create(&record).await?;
                self.store
                    .complete_create(op.id, entity_type, &record.id, &created)
                    .await?;
            }
            OperationAction::Update => {
                let record = op.record()?;
                let server_id = self.server_id(&record.id).await?;
                let updated = self.remote.update(&record.with_id(server_id)).await?;
                self.store
                    .complete_operation(op.id, entity_type, Mirror::Save(updated))
                    .await?;
            }
            OperationAction::Delete => {
                let id = op.record_id().ok_or_else(|| {
                    SyncError::ValidationFailed(format!("delete op {} names no record", op.id))
                })?;
                let server_id = self.server_id(&id).await?;
                self.remote.delete(&server_id).await?;
                self.store
                    .complete_operation(op.id, entity_type, Mirror::Remove(server_id))
                    .await?;
            }
        }
        Ok(())
    }

    /// Translates `id` to the id the remote issued. Fails while the create
    /// for `id` is still queued, so nothing is sent under an id the remote
    /// never saw.
    async fn server_id(&self, id: &RecordId) -> SyncResult<RecordId> {
        let server_id = self.store.resolve_id(self.entity_type, id).await?;
        if self
            .store
            .has_pending_create(self.entity_type, &server_id)
            .await?
        {
            return Err(SyncError::AwaitingCreate {
                entity_type: self.entity_type,
                id: server_id,
            });
        }
        Ok(server_id)
    }
}
