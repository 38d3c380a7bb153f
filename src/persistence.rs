//! Snapshot persistence for RageChain
//!
//! A node stores one record `{chain, pending_transactions, staked_balances,
//! pending_rage_reports}` and overwrites it after every mutation. The derived
//! maps are informational: on load the chain is validated and replayed.

use crate::blockchain::{Block, PendingReport};
use crate::error::ChainError;
use crate::transaction::{Address, Transaction};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub chain: Vec<Block>,
    #[serde(default)]
    pub pending_transactions: Vec<Transaction>,
    #[serde(default)]
    pub staked_balances: HashMap<Address, u64>,
    #[serde(default)]
    pub pending_rage_reports: HashMap<String, PendingReport>,
}

/// Abstraction for persistence backends. A save must replace the previous
/// snapshot as a whole.
pub trait Persistence: Send + Sync {
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), ChainError>;
    /// `Ok(None)` when nothing has been stored yet.
    fn load_snapshot(&self) -> Result<Option<Snapshot>, ChainError>;
}

/// One pretty-printed JSON file per node: `{data_dir}/chain_{node_id}.json`.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(data_dir: impl AsRef<Path>, node_id: &str) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("chain_{}.json", node_id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFilePersistence {
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), ChainError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write-then-rename so a crash never leaves a truncated snapshot.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<Snapshot>, ChainError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

/// SQLite backend storing the same JSON record, keyed by node id.
pub struct Database {
    conn: Mutex<Connection>,
    node_id: String,
}

impl Database {
    pub fn open(path: &str, node_id: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                node_id TEXT PRIMARY KEY,
                snapshot TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| {
            ChainError::DatabaseError(format!("Failed to create snapshots table: {}", e))
        })?;

        Ok(Database {
            conn: Mutex::new(conn),
            node_id: node_id.to_string(),
        })
    }
}

impl Persistence for Database {
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), ChainError> {
        let json = serde_json::to_string(snapshot).map_err(|e| {
            ChainError::DatabaseError(format!("Failed to serialize snapshot: {}", e))
        })?;

        let conn = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO snapshots (node_id, snapshot, updated_at) VALUES (?1, ?2, ?3)",
            params![self.node_id, json, chrono::Utc::now().timestamp()],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to save snapshot: {}", e)))?;
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<Snapshot>, ChainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        let json: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM snapshots WHERE node_id = ?1",
                params![self.node_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to load snapshot: {}", e)))?;

        match json {
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                ChainError::DatabaseError(format!("Failed to deserialize snapshot: {}", e))
            }),
            None => Ok(None),
        }
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    snapshot: Arc<Mutex<Option<Snapshot>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), ChainError> {
        let mut stored = self
            .snapshot
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        *stored = Some(snapshot.clone());
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<Snapshot>, ChainError> {
        let stored = self
            .snapshot
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(stored.clone())
    }
}
