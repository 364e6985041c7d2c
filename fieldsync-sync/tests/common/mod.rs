#![allow(dead_code)]

use fieldsync_storage::SqliteStore;
use fieldsync_sync::remote::mock::MockRemote;
use fieldsync_sync::{ConnectivityMonitor, EntityService};
use fieldsync_types::{EntityType, Record, RecordId};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// A facade over an in-memory store and a mock remote.
pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub remote: MockRemote,
    pub monitor: Arc<ConnectivityMonitor>,
    pub service: EntityService,
}

impl Harness {
    pub fn new(entity_type: EntityType, online: bool) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let remote = MockRemote::new(entity_type);
        let monitor = Arc::new(ConnectivityMonitor::new(online).with_queue(store.clone()));
        let service = EntityService::new(store.clone(), Arc::new(remote.clone()), monitor.clone());
        Self {
            store,
            remote,
            monitor,
            service,
        }
    }
}

pub fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

pub fn record(id: &str, name: &str) -> Record {
    Record::new(RecordId::new(id), fields(json!({ "name": name })))
}
