use fieldsync_storage::{OperationQueue, RecordStore, SqliteStore, SyncStore};
use fieldsync_types::{EntityType, NewOperation, Record};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn records_and_queue_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("fieldsync.db");
    let record = Record::new_local(json!({"name": "Acme"}).as_object().cloned().unwrap());

    {
        let store = SqliteStore::open(&path).unwrap();
        store
            .save_and_enqueue(
                EntityType::Account,
                &record,
                NewOperation::create(EntityType::Account, &record),
            )
            .await
            .unwrap();
    }

    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(
        reopened.get_by_id(EntityType::Account, &record.id).await.unwrap(),
        record
    );
    let queued = reopened.list_all().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].record_id(), Some(record.id));
}

#[tokio::test]
async fn processing_markers_can_be_reset_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fieldsync.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        let op = store
            .enqueue(NewOperation::delete(EntityType::Contact, &"c1".into()))
            .await
            .unwrap();
        store.set_processing(op.id, true).await.unwrap();
    }

    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(reopened.reset_processing().await.unwrap(), 1);
    assert!(!reopened.list_all().await.unwrap()[0].processing);
}
