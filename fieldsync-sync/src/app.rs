//! Wiring of the whole subsystem from a [`FieldSyncConfig`].

use crate::config::FieldSyncConfig;
use crate::connectivity::{ConnectivityMonitor, HttpProbe};
use crate::coordinator::SyncCoordinator;
use crate::credentials::CredentialProvider;
use crate::error::{SyncError, SyncResult};
use crate::remote::{HttpRemote, RemoteEndpoint, build_client};
use crate::report::CoordinatorReport;
use crate::service::EntityService;
use fieldsync_storage::{OperationQueue, SqliteStore, SyncStore};
use fieldsync_types::EntityType;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// A running offline-sync subsystem: store, monitor, one facade per
/// configured entity type and the coordinator that syncs them.
pub struct FieldSync {
    store: Arc<SqliteStore>,
    monitor: Arc<ConnectivityMonitor>,
    coordinator: Arc<SyncCoordinator>,
    poll_interval: Option<Duration>,
    tasks: Vec<JoinHandle<()>>,
}

impl FieldSync {
    /// Opens the database, resets interrupted operations, probes the
    /// initial connectivity state and builds an HTTP endpoint per entity.
    pub async fn open(
        config: &FieldSyncConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> SyncResult<Self> {
        config.validate()?;
        let store = Arc::new(SqliteStore::open(&config.database_path)?);

        let mut monitor = ConnectivityMonitor::new(true);
        if let Some(url) = &config.connectivity.probe_url {
            let timeout = Duration::from_millis(config.connectivity.probe_timeout_ms);
            monitor = monitor
                .with_probe(Arc::new(HttpProbe::new(url.as_str(), timeout)?))
                .detect()
                .await;
        }

        let client = build_client(&config.remote)?;
        let remotes: Vec<Arc<dyn RemoteEndpoint>> = config
            .entities
            .iter()
            .map(|entity| {
                Arc::new(HttpRemote::new(
                    client.clone(),
                    &config.remote.base_url,
                    entity,
                    credentials.clone(),
                )) as Arc<dyn RemoteEndpoint>
            })
            .collect();

        Self::from_parts(config, store, monitor, remotes).await
    }

    /// Assembles the subsystem around an existing store, monitor and set of
    /// remote endpoints (one per configured entity type).
    pub async fn from_parts(
        config: &FieldSyncConfig,
        store: Arc<SqliteStore>,
        monitor: ConnectivityMonitor,
        remotes: Vec<Arc<dyn RemoteEndpoint>>,
    ) -> SyncResult<Self> {
        let reset = store.reset_processing().await?;
        if reset > 0 {
            info!("recovered {} operations from an interrupted sync", reset);
        }

        let queue: Arc<dyn OperationQueue> = store.clone();
        let monitor = Arc::new(monitor.with_queue(queue));
        let sync_store: Arc<dyn SyncStore> = store.clone();

        let mut services = Vec::with_capacity(config.entities.len());
        for entity in &config.entities {
            let remote = remotes
                .iter()
                .find(|r| r.entity_type() == entity.entity_type)
                .cloned()
                .ok_or_else(|| {
                    SyncError::Config(format!("no remote endpoint for {}", entity.entity_type))
                })?;
            let service = EntityService::new(sync_store.clone(), remote, monitor.clone())
                .with_policy(config.online_failure_policy);
            services.push((Arc::new(service), entity.depends_on.clone()));
        }

        let coordinator = Arc::new(SyncCoordinator::new(monitor.clone(), services)?);
        info!(
            "fieldsync ready ({}), sync order: {:?}",
            monitor.state(),
            coordinator.order()
        );

        Ok(Self {
            store,
            monitor,
            coordinator,
            poll_interval: config.connectivity.poll_interval_secs.map(Duration::from_secs),
            tasks: Vec::new(),
        })
    }

    /// Facade for one entity type.
    pub fn service(&self, entity_type: EntityType) -> SyncResult<&Arc<EntityService>> {
        self.coordinator
            .service(entity_type)
            .ok_or_else(|| SyncError::Config(format!("{entity_type} is not configured")))
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Runs one dependency-ordered sync pass.
    pub async fn sync_all(&self) -> SyncResult<CoordinatorReport> {
        self.coordinator.sync_all().await
    }

    /// Starts the background coordinator loop and, if configured, the
    /// connectivity poller.
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }
        self.tasks.push(self.coordinator.clone().spawn());
        if let Some(interval) = self.poll_interval {
            self.tasks.push(self.monitor.clone().spawn_poller(interval));
        }
    }

    /// Stops background tasks started by [`Self::start`].
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for FieldSync {
    fn drop(&mut self) {
        self.shutdown();
    }
}
