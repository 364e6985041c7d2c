//! SQLite storage layer for fieldsync.
//!
//! Provides the two durable resources of the offline subsystem:
//! - the **Local Store**: one table per entity type, keyed by record id,
//!   holding the last known state of every record
//! - the **Pending Operation Queue**: an ordered log of mutation intents
//!   waiting to be replayed against the remote service
//!
//! Both live in one SQLite database so that mutations touching both (write a
//! record and queue its create, confirm a create and swap the local id for
//! the server id) commit as a single transaction.
//!
//! # Architecture
//!
//! - [`RecordStore`], [`OperationQueue`] and [`SyncStore`] are the narrow
//!   async contracts the sync layer depends on
//! - [`SqliteStore`] implements all three; blocking SQLite calls run on
//!   tokio's blocking pool
//! - Schema creation is idempotent and runs on open

mod error;
mod sqlite;
mod store;

pub use error::{StorageError, StorageResult};
pub use sqlite::SqliteStore;
pub use store::{Mirror, OperationQueue, RecordStore, SyncStore};

/// Opens a SQLite connection at `path`, creating parent directories and
/// applying the pragmas the store relies on.
pub fn open_sqlite(path: &std::path::Path) -> StorageResult<rusqlite::Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Unavailable(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }

    let conn = rusqlite::Connection::open(path).map_err(|e| {
        StorageError::Unavailable(format!("cannot open database {}: {e}", path.display()))
    })?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
    Ok(conn)
}
