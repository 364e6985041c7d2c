//! SQLite implementation of the store, the queue and the id index.

use crate::store::{Mirror, OperationQueue, RecordStore, SyncStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use fieldsync_types::{
    EntityType, NewOperation, OperationAction, OperationId, OperationKind, PendingOperation,
    Record, RecordId, Timestamp,
};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Local Store + Pending Operation Queue backed by one SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = crate::open_sqlite(path.as_ref())?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        info!("Opened local store at {}", path.as_ref().display());
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StorageError::Unavailable(format!("failed to open in-memory store: {e}"))
        })?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))?;

        for entity_type in EntityType::ALL {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    data TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    last_modified_at INTEGER NOT NULL
                );",
                table = entity_type.table_name()
            ))?;
        }

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS pending_operations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                data TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                processing INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_pending_operations_timestamp
                ON pending_operations (timestamp, id);

            CREATE TABLE IF NOT EXISTS id_mappings (
                entity_type TEXT NOT NULL,
                local_id TEXT NOT NULL,
                server_id TEXT NOT NULL,
                confirmed_at INTEGER NOT NULL,
                PRIMARY KEY (entity_type, local_id)
            );
            ",
        )?;
        Ok(())
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("storage task failed: {e}")))?
    }
}

// ── Row helpers ──────────────────────────────────────────────────

fn upsert_record(conn: &Connection, entity_type: EntityType, record: &Record) -> StorageResult<()> {
    let data = serde_json::to_string(&record.to_value())?;
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {} (id, data, created_at, last_modified_at)
             VALUES (?1, ?2, ?3, ?4)",
            entity_type.table_name()
        ),
        params![
            record.id.as_str(),
            data,
            record.created_at.as_millis(),
            record.last_modified_at.as_millis(),
        ],
    )?;
    Ok(())
}

fn delete_record(conn: &Connection, entity_type: EntityType, id: &str) -> StorageResult<bool> {
    let n = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", entity_type.table_name()),
        params![id],
    )?;
    Ok(n > 0)
}

fn parse_record(data: &str) -> StorageResult<Record> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    Ok(Record::from_value(value)?)
}

fn insert_operation(conn: &Connection, op: &NewOperation) -> StorageResult<PendingOperation> {
    let timestamp = Timestamp::now();
    let data = serde_json::to_string(&op.data)?;
    conn.execute(
        "INSERT INTO pending_operations (type, data, timestamp, processing) VALUES (?1, ?2, ?3, 0)",
        params![op.kind.to_string(), data, timestamp.as_millis()],
    )?;
    let id = OperationId::new(conn.last_insert_rowid());
    debug!("Enqueued {} as operation {}", op.kind, id);

    Ok(PendingOperation {
        id,
        kind: op.kind,
        data: op.data.clone(),
        timestamp,
        processing: false,
    })
}

fn delete_operation(conn: &Connection, id: OperationId) -> StorageResult<bool> {
    let n = conn.execute(
        "DELETE FROM pending_operations WHERE id = ?1",
        params![id.as_i64()],
    )?;
    Ok(n > 0)
}

fn load_operations(conn: &Connection) -> StorageResult<Vec<PendingOperation>> {
    let mut stmt = conn.prepare(
        "SELECT id, type, data, timestamp, processing FROM pending_operations ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        let id: i64 = row.get(0)?;
        let kind: String = row.get(1)?;
        let data: String = row.get(2)?;
        let timestamp: i64 = row.get(3)?;
        let processing: bool = row.get(4)?;
        Ok((id, kind, data, timestamp, processing))
    })?;

    let mut result = Vec::new();
    for row in rows {
        let (id, kind, data, timestamp, processing) = row?;
        let kind: OperationKind = kind.parse()?;
        result.push(PendingOperation {
            id: OperationId::new(id),
            kind,
            data: serde_json::from_str(&data)?,
            timestamp: Timestamp::from_millis(timestamp),
            processing,
        });
    }
    Ok(result)
}

/// True if an operation of `action` naming any of `ids` is still queued for
/// this entity type.
fn has_pending(
    conn: &Connection,
    action: OperationAction,
    entity_type: EntityType,
    ids: &[&str],
) -> StorageResult<bool> {
    let kind = OperationKind::new(action, entity_type).to_string();
    let mut stmt = conn.prepare(
        "SELECT 1 FROM pending_operations
         WHERE type = ?1 AND json_extract(data, '$.id') = ?2
         LIMIT 1",
    )?;
    for id in ids {
        if stmt.exists(params![kind, id])? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn has_pending_delete(
    tx: &Transaction<'_>,
    entity_type: EntityType,
    ids: &[&str],
) -> StorageResult<bool> {
    has_pending(tx, OperationAction::Delete, entity_type, ids)
}

// ── Local Store ──────────────────────────────────────────────────

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get_all(&self, entity_type: EntityType) -> StorageResult<Vec<Record>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT data FROM {} ORDER BY created_at, id",
                entity_type.table_name()
            ))?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut records = Vec::new();
            for data in rows {
                records.push(parse_record(&data?)?);
            }
            Ok(records)
        })
        .await
    }

    async fn get_by_id(&self, entity_type: EntityType, id: &RecordId) -> StorageResult<Record> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    &format!("SELECT data FROM {} WHERE id = ?1", entity_type.table_name()),
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            match data {
                Some(data) => parse_record(&data),
                None => Err(StorageError::NotFound { entity_type, id }),
            }
        })
        .await
    }

    async fn save(&self, entity_type: EntityType, record: &Record) -> StorageResult<()> {
        let record = record.clone();
        self.with_conn(move |conn| upsert_record(conn, entity_type, &record))
            .await
    }

    async fn save_many(&self, entity_type: EntityType, records: &[Record]) -> StorageResult<()> {
        let records = records.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for record in &records {
                upsert_record(&tx, entity_type, record)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, entity_type: EntityType, id: &RecordId) -> StorageResult<bool> {
        let id = id.clone();
        self.with_conn(move |conn| delete_record(conn, entity_type, id.as_str()))
            .await
    }

    async fn replace_all(&self, entity_type: EntityType, records: &[Record]) -> StorageResult<()> {
        let records = records.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(&format!("DELETE FROM {}", entity_type.table_name()), [])?;
            for record in &records {
                upsert_record(&tx, entity_type, record)?;
            }
            tx.commit()?;
            debug!("Replaced {} table with {} records", entity_type, records.len());
            Ok(())
        })
        .await
    }

    async fn count(&self, entity_type: EntityType) -> StorageResult<usize> {
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", entity_type.table_name()),
                [],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }
}

// ── Pending Operation Queue ──────────────────────────────────────

#[async_trait]
impl OperationQueue for SqliteStore {
    async fn enqueue(&self, op: NewOperation) -> StorageResult<PendingOperation> {
        self.with_conn(move |conn| insert_operation(conn, &op)).await
    }

    async fn list_all(&self) -> StorageResult<Vec<PendingOperation>> {
        self.with_conn(|conn| load_operations(conn)).await
    }

    async fn remove(&self, id: OperationId) -> StorageResult<bool> {
        self.with_conn(move |conn| delete_operation(conn, id)).await
    }

    async fn clear(&self) -> StorageResult<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM pending_operations", [])?))
            .await
    }

    async fn len(&self) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM pending_operations", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn set_processing(&self, id: OperationId, processing: bool) -> StorageResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE pending_operations SET processing = ?1 WHERE id = ?2",
                params![processing, id.as_i64()],
            )?;
            Ok(())
        })
        .await
    }

    async fn reset_processing(&self) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE pending_operations SET processing = 0 WHERE processing != 0",
                [],
            )?;
            if n > 0 {
                info!("Reset {} operations left in processing state", n);
            }
            Ok(n)
        })
        .await
    }
}

// ── Transactional boundary ───────────────────────────────────────

#[async_trait]
impl SyncStore for SqliteStore {
    async fn save_and_enqueue(
        &self,
        entity_type: EntityType,
        record: &Record,
        op: NewOperation,
    ) -> StorageResult<PendingOperation> {
        let record = record.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            upsert_record(&tx, entity_type, &record)?;
            let pending = insert_operation(&tx, &op)?;
            tx.commit()?;
            Ok(pending)
        })
        .await
    }

    async fn remove_and_enqueue(
        &self,
        entity_type: EntityType,
        id: &RecordId,
        op: NewOperation,
    ) -> StorageResult<PendingOperation> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let pending = insert_operation(&tx, &op)?;
            delete_record(&tx, entity_type, id.as_str())?;
            tx.commit()?;
            Ok(pending)
        })
        .await
    }

    async fn complete_create(
        &self,
        op_id: OperationId,
        entity_type: EntityType,
        local_id: &RecordId,
        server_record: &Record,
    ) -> StorageResult<()> {
        let local_id = local_id.clone();
        let server_record = server_record.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            delete_operation(&tx, op_id)?;

            let deleted_meanwhile = has_pending_delete(
                &tx,
                entity_type,
                &[local_id.as_str(), server_record.id.as_str()],
            )?;
            delete_record(&tx, entity_type, local_id.as_str())?;
            if !deleted_meanwhile {
                upsert_record(&tx, entity_type, &server_record)?;
            }

            tx.execute(
                "INSERT OR REPLACE INTO id_mappings (entity_type, local_id, server_id, confirmed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entity_type.as_str(),
                    local_id.as_str(),
                    server_record.id.as_str(),
                    Timestamp::now().as_millis(),
                ],
            )?;
            tx.commit()?;
            debug!(
                "Confirmed {} create: {} -> {}",
                entity_type, local_id, server_record.id
            );
            Ok(())
        })
        .await
    }

    async fn complete_operation(
        &self,
        op_id: OperationId,
        entity_type: EntityType,
        mirror: Mirror,
    ) -> StorageResult<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            delete_operation(&tx, op_id)?;
            match &mirror {
                Mirror::Nothing => {}
                Mirror::Save(record) => {
                    if !has_pending_delete(&tx, entity_type, &[record.id.as_str()])? {
                        upsert_record(&tx, entity_type, record)?;
                    }
                }
                Mirror::Remove(id) => {
                    delete_record(&tx, entity_type, id.as_str())?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn resolve_id(&self, entity_type: EntityType, id: &RecordId) -> StorageResult<RecordId> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let server_id: Option<String> = conn
                .query_row(
                    "SELECT server_id FROM id_mappings WHERE entity_type = ?1 AND local_id = ?2",
                    params![entity_type.as_str(), id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(server_id.map(RecordId::new).unwrap_or(id))
        })
        .await
    }

    async fn is_confirmed(
        &self,
        entity_type: EntityType,
        local_id: &RecordId,
    ) -> StorageResult<bool> {
        let local_id = local_id.clone();
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM id_mappings WHERE entity_type = ?1 AND local_id = ?2",
                    params![entity_type.as_str(), local_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn has_pending_create(
        &self,
        entity_type: EntityType,
        id: &RecordId,
    ) -> StorageResult<bool> {
        let id = id.clone();
        self.with_conn(move |conn| {
            has_pending(conn, OperationAction::Create, entity_type, &[id.as_str()])
        })
        .await
    }
}
