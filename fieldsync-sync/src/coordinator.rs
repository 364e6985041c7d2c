//! Cross-entity sync ordering.
//!
//! Records reference each other (a contact points at its account), so a
//! dependent type only syncs after the types it depends on have synced
//! cleanly in the same pass.

use crate::config::dependency_order;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::report::{CoordinatorReport, EntityOutcome};
use crate::service::EntityService;
use fieldsync_types::EntityType;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Entry {
    service: Arc<EntityService>,
    depends_on: Vec<EntityType>,
}

/// Runs every facade's orchestrator in dependency order.
pub struct SyncCoordinator {
    monitor: Arc<ConnectivityMonitor>,
    entries: Vec<Entry>,
    wake: Notify,
}

impl SyncCoordinator {
    /// Orders `services` by their dependencies. Fails on cycles and on
    /// dependencies with no service.
    pub fn new(
        monitor: Arc<ConnectivityMonitor>,
        services: Vec<(Arc<EntityService>, Vec<EntityType>)>,
    ) -> SyncResult<Self> {
        let deps: Vec<(EntityType, Vec<EntityType>)> = services
            .iter()
            .map(|(service, depends_on)| (service.entity_type(), depends_on.clone()))
            .collect();
        let order = dependency_order(&deps)?;

        let mut pool: Vec<Option<Entry>> = services
            .into_iter()
            .map(|(service, depends_on)| Some(Entry { service, depends_on }))
            .collect();
        let mut entries = Vec::with_capacity(order.len());
        for entity_type in order {
            let entry = pool
                .iter_mut()
                .find(|e| e.as_ref().is_some_and(|e| e.service.entity_type() == entity_type))
                .and_then(Option::take)
                .ok_or_else(|| SyncError::Config(format!("no service for {entity_type}")))?;
            entries.push(entry);
        }

        Ok(Self {
            monitor,
            entries,
            wake: Notify::new(),
        })
    }

    /// Entity types in the order they sync.
    pub fn order(&self) -> Vec<EntityType> {
        self.entries.iter().map(|e| e.service.entity_type()).collect()
    }

    pub fn service(&self, entity_type: EntityType) -> Option<&Arc<EntityService>> {
        self.entries
            .iter()
            .map(|e| &e.service)
            .find(|s| s.entity_type() == entity_type)
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    /// Syncs every entity type once. A type whose dependency failed or was
    /// skipped is itself skipped and left queued for the next pass.
    pub async fn sync_all(&self) -> SyncResult<CoordinatorReport> {
        if !self.monitor.is_online() {
            return Err(SyncError::Offline);
        }

        let mut report = CoordinatorReport::default();
        let mut unclean: HashSet<EntityType> = HashSet::new();

        for entry in &self.entries {
            let entity_type = entry.service.entity_type();
            if let Some(&blocked_by) = entry.depends_on.iter().find(|d| unclean.contains(*d)) {
                info!("skipping {} sync: {} did not sync cleanly", entity_type, blocked_by);
                unclean.insert(entity_type);
                report
                    .outcomes
                    .push((entity_type, EntityOutcome::Skipped { blocked_by }));
                continue;
            }

            let outcome = match entry.service.sync_pending_operations().await {
                Ok(sync_report) => {
                    if !sync_report.is_clean() {
                        unclean.insert(entity_type);
                    }
                    EntityOutcome::Synced(sync_report)
                }
                Err(e) => {
                    warn!("{} sync failed: {}", entity_type, e);
                    unclean.insert(entity_type);
                    EntityOutcome::Failed(e.to_string())
                }
            };
            report.outcomes.push((entity_type, outcome));
        }

        info!("sync pass finished: {}", report.totals());
        Ok(report)
    }

    /// Requests a pass from outside, e.g. from an OS background task.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Waits for a sync-needed signal or a wake-up and runs a pass, forever.
    pub async fn run(&self) {
        loop {
            tokio::select! {
                _ = self.monitor.sync_needed() => debug!("sync needed after reconnection"),
                _ = self.wake.notified() => debug!("sync requested"),
            }
            if !self.monitor.is_online() {
                debug!("woken while offline, waiting for reconnection");
                continue;
            }
            if let Err(e) = self.sync_all().await {
                warn!("sync pass failed: {}", e);
            }
        }
    }

    /// Runs [`Self::run`] on a background task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
