//! In-memory remote endpoint for tests and demos.

use super::RemoteEndpoint;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use fieldsync_types::{EntityType, Record, RecordId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A call observed by a [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    List,
    Get(RecordId),
    Create(Record),
    Update(Record),
    Delete(RecordId),
}

/// A failure a [`MockRemote`] can be told to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Unauthorized,
    Network,
    Validation,
    /// A non-2xx status.
    Server(u16),
}

impl MockFailure {
    fn to_error(self) -> SyncError {
        match self {
            MockFailure::Unauthorized => SyncError::RemoteUnauthorized("token rejected".into()),
            MockFailure::Network => SyncError::NetworkUnreachable("connection refused".into()),
            MockFailure::Validation => SyncError::ValidationFailed("payload rejected".into()),
            MockFailure::Server(status) => SyncError::RemoteRequestFailed {
                status,
                message: "server error".into(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    records: Vec<Record>,
    calls: Vec<RemoteCall>,
    fail_all: Option<MockFailure>,
    fail_ids: HashMap<RecordId, MockFailure>,
    next_ids: VecDeque<RecordId>,
    issued: u64,
}

/// A remote endpoint backed by a vector of records.
///
/// Clones share state, so a test can keep one handle while the code under
/// test owns another.
#[derive(Debug, Clone)]
pub struct MockRemote {
    entity_type: EntityType,
    state: Arc<Mutex<MockState>>,
}

impl MockRemote {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a record as if it already existed remotely.
    pub fn insert(&self, record: Record) {
        upsert(&mut self.state().records, record);
    }

    /// Records currently held.
    pub fn records(&self) -> Vec<Record> {
        self.state().records.clone()
    }

    pub fn record(&self, id: &RecordId) -> Option<Record> {
        self.state().records.iter().find(|r| &r.id == id).cloned()
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of create calls received.
    pub fn create_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, RemoteCall::Create(_)))
            .count()
    }

    /// Makes every call fail (or succeed again with `None`).
    pub fn fail_all(&self, failure: Option<MockFailure>) {
        self.state().fail_all = failure;
    }

    /// Makes calls targeting one record id fail.
    pub fn fail_for(&self, id: impl Into<RecordId>, failure: MockFailure) {
        self.state().fail_ids.insert(id.into(), failure);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.fail_all = None;
        state.fail_ids.clear();
    }

    /// Queues the id the next create will be issued. Unscripted creates
    /// get `srv-1`, `srv-2`, ...
    pub fn push_server_id(&self, id: impl Into<RecordId>) {
        self.state().next_ids.push_back(id.into());
    }

    /// Logs `call` and returns the configured failure, if any.
    fn observe(&self, call: RemoteCall, id: Option<&RecordId>) -> SyncResult<()> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some(failure) = state.fail_all {
            return Err(failure.to_error());
        }
        if let Some(failure) = id.and_then(|id| state.fail_ids.get(id)) {
            return Err(failure.to_error());
        }
        Ok(())
    }
}

fn upsert(records: &mut Vec<Record>, record: Record) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

#[async_trait]
impl RemoteEndpoint for MockRemote {
    fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    async fn list(&self) -> SyncResult<Vec<Record>> {
        self.observe(RemoteCall::List, None)?;
        Ok(self.records())
    }

    async fn get(&self, id: &RecordId) -> SyncResult<Record> {
        self.observe(RemoteCall::Get(id.clone()), Some(id))?;
        self.record(id).ok_or_else(|| SyncError::NotFound {
            entity_type: self.entity_type,
            id: id.clone(),
        })
    }

    async fn create(&self, record: &Record) -> SyncResult<Record> {
        self.observe(RemoteCall::Create(record.clone()), Some(&record.id))?;
        let mut state = self.state();
        let server_id = match state.next_ids.pop_front() {
            Some(id) => id,
            None => {
                state.issued += 1;
                RecordId::new(format!("srv-{}", state.issued))
            }
        };
        let created = record.clone().with_id(server_id);
        upsert(&mut state.records, created.clone());
        Ok(created)
    }

    async fn update(&self, record: &Record) -> SyncResult<Record> {
        self.observe(RemoteCall::Update(record.clone()), Some(&record.id))?;
        upsert(&mut self.state().records, record.clone());
        Ok(record.clone())
    }

    async fn delete(&self, id: &RecordId) -> SyncResult<()> {
        self.observe(RemoteCall::Delete(id.clone()), Some(id))?;
        self.state().records.retain(|r| &r.id != id);
        Ok(())
    }
}
