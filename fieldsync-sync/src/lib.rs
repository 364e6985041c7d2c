//! Offline-first sync for fieldsync.
//!
//! Business records live in a local SQLite store that is always readable.
//! While the device is online, every mutation goes straight to the remote
//! service and the result is mirrored locally. While offline, mutations are
//! applied locally and queued; on reconnection the queue is replayed
//! against the remote in creation order.
//!
//! # Components
//!
//! - **Connectivity monitor**: single source of online/offline state;
//!   confirms reconnections with a reachability probe and raises a
//!   sync-needed signal when operations are waiting
//! - **Remote endpoint**: CRUD over HTTP/JSON for one entity type, with a
//!   bearer token resolved per call from a [`CredentialProvider`]
//! - **Sync orchestrator**: replays one entity type's queued operations,
//!   tolerating per-operation failures
//! - **Entity service**: the facade the UI talks to; picks the online or
//!   offline path per call
//! - **Sync coordinator**: runs the orchestrators in dependency order
//!   (accounts before the records that reference them)
//!
//! # Example
//!
//! ```no_run
//! use fieldsync_sync::{FieldSync, FieldSyncConfig, StaticToken};
//! use fieldsync_types::EntityType;
//! use std::sync::Arc;
//!
//! # async fn example() -> fieldsync_sync::SyncResult<()> {
//! let config = FieldSyncConfig::load("fieldsync.json")?;
//! let sync = FieldSync::open(&config, Arc::new(StaticToken::new("token"))).await?;
//!
//! let accounts = sync.service(EntityType::Account)?;
//! let acme = accounts.create(serde_json::json!({ "name": "Acme" })).await?;
//! println!("created {}", acme.id);
//! # Ok(())
//! # }
//! ```

mod app;
pub mod config;
pub mod connectivity;
mod coordinator;
pub mod credentials;
mod error;
mod orchestrator;
pub mod remote;
mod report;
mod service;

pub use app::FieldSync;
pub use config::{
    ConnectivityConfig, EntityConfig, FieldSyncConfig, OnlineFailurePolicy, RemoteConfig,
};
pub use connectivity::{
    ConnectivityEvent, ConnectivityMonitor, ConnectivityState, HostSignal, HttpProbe, Listener,
    ListenerId, ManualProbe, ReachabilityProbe,
};
pub use coordinator::SyncCoordinator;
pub use credentials::{CredentialProvider, NoCredentials, SessionToken, StaticToken};
pub use error::{SyncError, SyncResult};
pub use orchestrator::SyncOrchestrator;
pub use remote::{HttpRemote, RemoteEndpoint};
pub use report::{CoordinatorReport, EntityOutcome, SyncReport};
pub use service::EntityService;
