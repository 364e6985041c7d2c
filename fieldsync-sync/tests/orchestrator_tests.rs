mod common;

use common::{fields, record};
use fieldsync_storage::{OperationQueue, RecordStore, SqliteStore, SyncStore};
use fieldsync_sync::remote::mock::{MockFailure, MockRemote, RemoteCall};
use fieldsync_sync::{ConnectivityMonitor, HostSignal, SyncError, SyncOrchestrator, SyncReport};
use fieldsync_types::{EntityType, NewOperation, Record, RecordId};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    store: Arc<SqliteStore>,
    remote: MockRemote,
    monitor: Arc<ConnectivityMonitor>,
    orchestrator: SyncOrchestrator,
}

fn fixture(online: bool) -> Fixture {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let remote = MockRemote::new(EntityType::Account);
    let monitor = Arc::new(ConnectivityMonitor::new(online));
    let orchestrator =
        SyncOrchestrator::new(store.clone(), Arc::new(remote.clone()), monitor.clone());
    Fixture {
        store,
        remote,
        monitor,
        orchestrator,
    }
}

async fn queue_create(store: &SqliteStore, name: &str) -> Record {
    let local = Record::new_local(fields(json!({ "name": name })));
    store
        .save_and_enqueue(
            EntityType::Account,
            &local,
            NewOperation::create(EntityType::Account, &local),
        )
        .await
        .unwrap();
    local
}

// ── Offline ─────────────────────────────────────────────────────

#[tokio::test]
async fn offline_sync_fails_without_remote_calls() {
    let f = fixture(false);
    queue_create(&f.store, "Acme").await;

    let err = f.orchestrator.sync_pending_operations().await.unwrap_err();

    assert!(matches!(err, SyncError::Offline));
    assert_eq!(err.to_string(), "cannot sync while offline");
    assert!(f.remote.calls().is_empty());
    assert_eq!(f.store.len().await.unwrap(), 1);
}

// ── Create ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_replaces_local_id_with_server_id() {
    let f = fixture(true);
    let local = queue_create(&f.store, "Acme").await;
    f.remote.push_server_id("001xyz");

    let report = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(
        report,
        SyncReport {
            synced: 1,
            errors: 0,
            total: 1
        }
    );
    assert!(f.store.is_empty().await.unwrap());
    let synced = f
        .store
        .get_by_id(EntityType::Account, &RecordId::new("001xyz"))
        .await
        .unwrap();
    assert_eq!(synced.get("name"), Some(&json!("Acme")));
    assert!(
        f.store
            .get_by_id(EntityType::Account, &local.id)
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert_eq!(
        f.store
            .resolve_id(EntityType::Account, &local.id)
            .await
            .unwrap(),
        RecordId::new("001xyz")
    );
}

#[tokio::test]
async fn second_sync_does_not_resubmit() {
    let f = fixture(true);
    queue_create(&f.store, "Acme").await;

    f.orchestrator.sync_pending_operations().await.unwrap();
    let second = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(second, SyncReport::new(0));
    assert_eq!(f.remote.create_count(), 1);
}

#[tokio::test]
async fn duplicate_create_for_confirmed_id_is_only_dequeued() {
    let f = fixture(true);
    let local = queue_create(&f.store, "Acme").await;
    f.store
        .enqueue(NewOperation::create(EntityType::Account, &local))
        .await
        .unwrap();

    let report = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(report.synced, 2);
    assert_eq!(f.remote.create_count(), 1);
    assert!(f.store.is_empty().await.unwrap());
}

// ── Ordering and id translation ─────────────────────────────────

#[tokio::test]
async fn update_after_create_targets_server_id() {
    let f = fixture(true);
    let mut local = queue_create(&f.store, "Acme").await;
    local.merge(fields(json!({ "name": "Acme Corp" })));
    f.store
        .save_and_enqueue(
            EntityType::Account,
            &local,
            NewOperation::update(EntityType::Account, &local),
        )
        .await
        .unwrap();
    f.remote.push_server_id("001xyz");

    let report = f.orchestrator.sync_pending_operations().await.unwrap();
    assert_eq!(report.synced, 2);

    let calls = f.remote.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], RemoteCall::Create(r) if r.id == local.id));
    assert!(matches!(&calls[1], RemoteCall::Update(r) if r.id.as_str() == "001xyz"));

    let records = f.store.get_all(EntityType::Account).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, RecordId::new("001xyz"));
    assert_eq!(records[0].get("name"), Some(&json!("Acme Corp")));
}

#[tokio::test]
async fn delete_of_synced_local_id_targets_server_id() {
    let f = fixture(true);
    let local = queue_create(&f.store, "Acme").await;
    f.remote.push_server_id("001xyz");
    f.orchestrator.sync_pending_operations().await.unwrap();

    f.store
        .enqueue(NewOperation::delete(EntityType::Account, &local.id))
        .await
        .unwrap();
    f.remote.clear_calls();
    let report = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(
        f.remote.calls(),
        vec![RemoteCall::Delete(RecordId::new("001xyz"))]
    );
    assert!(f.remote.records().is_empty());
    assert_eq!(f.store.count(EntityType::Account).await.unwrap(), 0);
}

#[tokio::test]
async fn create_then_delete_offline_leaves_nothing_locally() {
    let f = fixture(true);
    let local = queue_create(&f.store, "Acme").await;
    f.store
        .remove_and_enqueue(
            EntityType::Account,
            &local.id,
            NewOperation::delete(EntityType::Account, &local.id),
        )
        .await
        .unwrap();

    let report = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(report.synced, 2);
    assert_eq!(f.store.count(EntityType::Account).await.unwrap(), 0);
    assert!(f.remote.records().is_empty());
}

// ── Failures ────────────────────────────────────────────────────

#[tokio::test]
async fn replay_follows_timestamps_not_queue_ids() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("fieldsync.db");
    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let remote = MockRemote::new(EntityType::Account);
    let monitor = Arc::new(ConnectivityMonitor::new(true));
    let orchestrator =
        SyncOrchestrator::new(store.clone(), Arc::new(remote.clone()), monitor.clone());

    // The update is queued first but carries the later timestamp.
    let mut renamed = record("x1", "Acme");
    renamed.merge(fields(json!({ "name": "Acme Corp" })));
    store
        .enqueue(NewOperation::update(EntityType::Account, &renamed))
        .await
        .unwrap();
    store
        .enqueue(NewOperation::create(EntityType::Account, &record("x1", "Acme")))
        .await
        .unwrap();
    let raw = fieldsync_storage::open_sqlite(&path).unwrap();
    raw.execute(
        "UPDATE pending_operations SET timestamp = 2 WHERE type = 'UPDATE_ACCOUNT'",
        [],
    )
    .unwrap();
    raw.execute(
        "UPDATE pending_operations SET timestamp = 1 WHERE type = 'CREATE_ACCOUNT'",
        [],
    )
    .unwrap();

    let report = orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(report.synced, 2);
    let calls = remote.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], RemoteCall::Create(r) if r.id.as_str() == "x1"));
    assert!(matches!(&calls[1], RemoteCall::Update(r) if r.id.as_str() == "srv-1"));
    assert_eq!(remote.records().len(), 1);
    assert_eq!(remote.records()[0].get("name"), Some(&json!("Acme Corp")));
}

#[tokio::test]
async fn update_waits_for_its_failed_create() {
    let f = fixture(true);
    let mut local = queue_create(&f.store, "Acme").await;
    local.merge(fields(json!({ "name": "Acme Corp" })));
    f.store
        .save_and_enqueue(
            EntityType::Account,
            &local,
            NewOperation::update(EntityType::Account, &local),
        )
        .await
        .unwrap();
    f.remote.fail_for(local.id.clone(), MockFailure::Server(503));

    let report = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(report.errors, 2);
    assert!(matches!(f.remote.calls().as_slice(), [RemoteCall::Create(_)]));
    assert_eq!(f.store.len().await.unwrap(), 2);

    f.remote.clear_failures();
    f.remote.clear_calls();
    let report = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(report.synced, 2);
    assert!(matches!(
        f.remote.calls().as_slice(),
        [RemoteCall::Create(_), RemoteCall::Update(r)] if r.id.as_str() == "srv-1"
    ));
    assert_eq!(f.remote.records().len(), 1);
    assert_eq!(f.remote.records()[0].get("name"), Some(&json!("Acme Corp")));
}

#[tokio::test]
async fn delete_waits_for_its_failed_create() {
    let f = fixture(true);
    let local = queue_create(&f.store, "Acme").await;
    f.store
        .remove_and_enqueue(
            EntityType::Account,
            &local.id,
            NewOperation::delete(EntityType::Account, &local.id),
        )
        .await
        .unwrap();
    f.remote.fail_for(local.id.clone(), MockFailure::Network);

    let report = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(report.errors, 2);
    assert_eq!(f.remote.calls().len(), 1);
    assert_eq!(f.store.len().await.unwrap(), 2);
}


#[tokio::test]
async fn partial_failure_keeps_failed_op_queued() {
    let f = fixture(true);
    queue_create(&f.store, "first").await;
    let second = queue_create(&f.store, "second").await;
    queue_create(&f.store, "third").await;
    f.remote.fail_for(second.id.clone(), MockFailure::Validation);

    let report = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(
        report,
        SyncReport {
            synced: 2,
            errors: 1,
            total: 3
        }
    );
    let left = f.store.list_all().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].record_id(), Some(second.id.clone()));
    assert!(!left[0].processing);
    assert_eq!(f.remote.create_count(), 3);
}

#[tokio::test]
async fn unauthorized_batch_is_counted_not_raised() {
    let f = fixture(true);
    queue_create(&f.store, "a").await;
    queue_create(&f.store, "b").await;
    f.remote.fail_all(Some(MockFailure::Unauthorized));

    let report = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(report.errors, 2);
    assert_eq!(report.synced, 0);
    assert_eq!(f.store.len().await.unwrap(), 2);
}

#[tokio::test]
async fn failed_ops_succeed_on_a_later_run() {
    let f = fixture(true);
    queue_create(&f.store, "a").await;
    f.remote.fail_all(Some(MockFailure::Network));
    assert_eq!(f.orchestrator.sync_pending_operations().await.unwrap().errors, 1);

    f.remote.clear_failures();
    let report = f.orchestrator.sync_pending_operations().await.unwrap();
    assert_eq!(report.synced, 1);
    assert!(f.store.is_empty().await.unwrap());
}

// ── Scope and concurrency ───────────────────────────────────────

#[tokio::test]
async fn only_own_entity_type_is_replayed() {
    let f = fixture(true);
    queue_create(&f.store, "Acme").await;
    let contact = record("c1", "Jane");
    f.store
        .save_and_enqueue(
            EntityType::Contact,
            &contact,
            NewOperation::create(EntityType::Contact, &contact),
        )
        .await
        .unwrap();

    let report = f.orchestrator.sync_pending_operations().await.unwrap();

    assert_eq!(report.total, 1);
    let left = f.store.list_all().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].entity_type(), EntityType::Contact);
}

#[tokio::test]
async fn overlapping_runs_do_not_double_submit() {
    let f = fixture(true);
    queue_create(&f.store, "Acme").await;

    let (a, b) = tokio::join!(
        f.orchestrator.sync_pending_operations(),
        f.orchestrator.sync_pending_operations()
    );

    assert_eq!(a.unwrap().synced + b.unwrap().synced, 1);
    assert_eq!(f.remote.create_count(), 1);
}

#[tokio::test]
async fn going_offline_blocks_the_next_run() {
    let f = fixture(true);
    f.monitor.handle_host_signal(HostSignal::Offline).await;
    assert!(matches!(
        f.orchestrator.sync_pending_operations().await,
        Err(SyncError::Offline)
    ));
}
