//! SQLite-backed local mirror of remote business data.
//!
//! The database lives at `~/.shopsync/cache.db` and is a disposable cache.
//! The remote system remains the source of truth; this store makes reads
//! work offline and keeps queued writes alive across restarts. When SQLite
//! cannot be opened the session degrades to an in-memory store with the
//! same interface (no durability, but no crash).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::config::SyncConfig;
use crate::types::{EntityKind, EntityRecord, PendingOperation};

/// Errors specific to durable-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored row references unknown entity table: {0}")]
    UnknownEntity(String),

    #[error("Stored row has invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Keyed, per-entity persistent tables plus the pending-operation log.
///
/// `put_all` is a full replace: after it returns, the table holds exactly
/// the given set, one remote snapshot, never an interleaving of two.
pub trait DurableStore: Send + Sync {
    fn put_all(&self, entity: EntityKind, records: &[EntityRecord]) -> Result<(), StoreError>;

    /// Returns every record for the table; absence is an empty vec, not an
    /// error.
    fn get_all(&self, entity: EntityKind) -> Result<Vec<EntityRecord>, StoreError>;

    fn clear(&self, entity: EntityKind) -> Result<(), StoreError>;

    /// Append a pending operation to the durable queue log.
    fn append_pending(&self, op: &PendingOperation) -> Result<(), StoreError>;

    /// Remove a pending operation after (and only after) remote ack.
    fn remove_pending(&self, local_id: &str) -> Result<(), StoreError>;

    /// All pending operations in enqueue order (FIFO).
    fn pending_operations(&self) -> Result<Vec<PendingOperation>, StoreError>;

    fn clear_pending(&self) -> Result<(), StoreError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entity_records (
    table_name TEXT NOT NULL,
    id         TEXT NOT NULL,
    data       TEXT NOT NULL,
    PRIMARY KEY (table_name, id)
);

CREATE TABLE IF NOT EXISTS pending_operations (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    local_id   TEXT NOT NULL UNIQUE,
    entity     TEXT NOT NULL,
    payload    TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

/// SQLite store wrapper.
///
/// The connection is intentionally held behind a non-poisoning `Mutex`;
/// all store operations are short synchronous transactions, which is the
/// serialization discipline the rest of the layer assumes.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `~/.shopsync/cache.db` and apply
    /// the schema.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(Self::db_path()?)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL keeps reads fast while a replace transaction commits
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        // Idempotent: all statements use IF NOT EXISTS
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Resolve the default database path: `~/.shopsync/cache.db`.
    fn db_path() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeDirNotFound)?;
        Ok(home.join(".shopsync").join("cache.db"))
    }
}

impl DurableStore for SqliteStore {
    fn put_all(&self, entity: EntityKind, records: &[EntityRecord]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM entity_records WHERE table_name = ?1",
            params![entity.table_name()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO entity_records (table_name, id, data) VALUES (?1, ?2, ?3)",
            )?;
            for record in records {
                let data = serde_json::to_string(&record.data)?;
                stmt.execute(params![entity.table_name(), record.id, data])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_all(&self, entity: EntityKind) -> Result<Vec<EntityRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, data FROM entity_records WHERE table_name = ?1")?;

        let rows = stmt.query_map(params![entity.table_name()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, data) = row?;
            records.push(EntityRecord {
                id,
                data: serde_json::from_str(&data)?,
            });
        }
        Ok(records)
    }

    fn clear(&self, entity: EntityKind) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM entity_records WHERE table_name = ?1",
            params![entity.table_name()],
        )?;
        Ok(())
    }

    fn append_pending(&self, op: &PendingOperation) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO pending_operations (local_id, entity, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                op.local_id,
                op.entity.table_name(),
                serde_json::to_string(&op.payload)?,
                op.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn remove_pending(&self, local_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM pending_operations WHERE local_id = ?1",
            params![local_id],
        )?;
        Ok(())
    }

    fn pending_operations(&self) -> Result<Vec<PendingOperation>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT local_id, entity, payload, created_at
             FROM pending_operations ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut ops = Vec::new();
        for row in rows {
            let (local_id, entity, payload, created_at) = row?;
            let entity = EntityKind::from_table_name(&entity)
                .ok_or_else(|| StoreError::UnknownEntity(entity.clone()))?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|_| StoreError::InvalidTimestamp(created_at.clone()))?
                .with_timezone(&Utc);
            ops.push(PendingOperation {
                local_id,
                entity,
                payload: serde_json::from_str(&payload)?,
                created_at,
            });
        }
        Ok(ops)
    }

    fn clear_pending(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM pending_operations", [])?;
        Ok(())
    }
}

/// In-memory fallback used when SQLite is unavailable.
///
/// Same contract, session-only durability.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<EntityKind, Vec<EntityRecord>>>,
    pending: Mutex<Vec<PendingOperation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn put_all(&self, entity: EntityKind, records: &[EntityRecord]) -> Result<(), StoreError> {
        self.tables.lock().insert(entity, records.to_vec());
        Ok(())
    }

    fn get_all(&self, entity: EntityKind) -> Result<Vec<EntityRecord>, StoreError> {
        Ok(self.tables.lock().get(&entity).cloned().unwrap_or_default())
    }

    fn clear(&self, entity: EntityKind) -> Result<(), StoreError> {
        self.tables.lock().remove(&entity);
        Ok(())
    }

    fn append_pending(&self, op: &PendingOperation) -> Result<(), StoreError> {
        self.pending.lock().push(op.clone());
        Ok(())
    }

    fn remove_pending(&self, local_id: &str) -> Result<(), StoreError> {
        self.pending.lock().retain(|op| op.local_id != local_id);
        Ok(())
    }

    fn pending_operations(&self) -> Result<Vec<PendingOperation>, StoreError> {
        Ok(self.pending.lock().clone())
    }

    fn clear_pending(&self) -> Result<(), StoreError> {
        self.pending.lock().clear();
        Ok(())
    }
}

/// Open the configured durable store, degrading to memory-only when SQLite
/// is unavailable (quota, permissions, disabled storage).
pub fn open_or_memory(config: &SyncConfig) -> Arc<dyn DurableStore> {
    if config.in_memory {
        return Arc::new(MemoryStore::new());
    }

    let result = match &config.db_path {
        Some(path) => SqliteStore::open_at(path.clone()),
        None => SqliteStore::open(),
    };

    match result {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::warn!("Durable store unavailable: {e}. Degrading to memory-only session.");
            Arc::new(MemoryStore::new())
        }
    }
}
