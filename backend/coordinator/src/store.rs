use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info};

use hintforge_core::{pool_key, HintError, PersistedPool, PoolStore, TabId};

/// SQLite-backed pool store. Each tab's pool is one JSON row keyed
/// `pool:<tabId>`.
pub struct SqlitePoolStore {
    conn: Mutex<Connection>,
}

impl SqlitePoolStore {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        init_schema(&conn)?;
        info!(path = ?path.as_ref(), "Pool store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored pools.
    pub async fn count(&self) -> Result<usize, HintError> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT COUNT(*) FROM pools", [], |row| row.get(0))
            .map_err(storage_error)
    }
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS pools (
            key TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )
    .context("Failed to initialize pools schema")?;
    Ok(())
}

fn storage_error(e: impl std::fmt::Display) -> HintError {
    HintError::Storage(e.to_string())
}

fn decode(key: &str, raw: &str) -> Result<PersistedPool, HintError> {
    serde_json::from_str(raw)
        .map_err(|e| HintError::CorruptState(format!("{key}: {e}")))
}

#[async_trait]
impl PoolStore for SqlitePoolStore {
    async fn load(&self, tab_id: TabId) -> Result<Option<PersistedPool>, HintError> {
        let key = pool_key(tab_id);
        let conn = self.conn.lock().await;
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM pools WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_error)?;
        raw.map(|raw| decode(&key, &raw)).transpose()
    }

    async fn save(&self, tab_id: TabId, pool: &PersistedPool) -> Result<(), HintError> {
        let key = pool_key(tab_id);
        let state = serde_json::to_string(pool).map_err(storage_error)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO pools (key, state, updated_at) VALUES (?1, ?2, ?3)",
            params![key, state, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(storage_error)?;
        debug!(key = %key, "Pool state saved");
        Ok(())
    }

    async fn remove(&self, tab_id: TabId) -> Result<(), HintError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM pools WHERE key = ?1", params![pool_key(tab_id)])
            .map_err(storage_error)?;
        Ok(())
    }
}

/// Process-local pool store. State is still kept in its JSON wire form.
#[derive(Default)]
pub struct MemoryPoolStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryPoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON stored for a tab.
    pub async fn raw(&self, tab_id: TabId) -> Option<String> {
        self.entries.lock().await.get(&pool_key(tab_id)).cloned()
    }
}

#[async_trait]
impl PoolStore for MemoryPoolStore {
    async fn load(&self, tab_id: TabId) -> Result<Option<PersistedPool>, HintError> {
        let key = pool_key(tab_id);
        let entries = self.entries.lock().await;
        entries.get(&key).map(|raw| decode(&key, raw)).transpose()
    }

    async fn save(&self, tab_id: TabId, pool: &PersistedPool) -> Result<(), HintError> {
        let state = serde_json::to_string(pool).map_err(storage_error)?;
        self.entries.lock().await.insert(pool_key(tab_id), state);
        Ok(())
    }

    async fn remove(&self, tab_id: TabId) -> Result<(), HintError> {
        self.entries.lock().await.remove(&pool_key(tab_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hintforge_core::{LabelPool, LabelUniverse};

    fn sample() -> PersistedPool {
        let mut pool = LabelPool::new(LabelUniverse::from_labels(["a", "b", "aa"]));
        pool.claim(2, 1);
        pool.to_persisted()
    }

    #[tokio::test]
    async fn test_sqlite_save_and_load() {
        let store = SqlitePoolStore::in_memory().unwrap();
        assert!(store.load(1).await.unwrap().is_none());

        store.save(1, &sample()).await.unwrap();
        store.save(1, &sample()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.load(1).await.unwrap(), Some(sample()));

        store.remove(1).await.unwrap();
        assert!(store.load(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pools.db");
        {
            let store = SqlitePoolStore::open(&path).unwrap();
            store.save(9, &sample()).await.unwrap();
        }
        let store = SqlitePoolStore::open(&path).unwrap();
        assert_eq!(store.load(9).await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() {
        let store = SqlitePoolStore::in_memory().unwrap();
        {
            let conn = store.conn.lock().await;
            conn.execute(
                "INSERT INTO pools (key, state, updated_at) VALUES ('pool:3', '{\"free\":1}', '')",
                [],
            )
            .unwrap();
        }
        let err = store.load(3).await.unwrap_err();
        assert!(matches!(err, HintError::CorruptState(_)));
    }

    #[tokio::test]
    async fn test_memory_store_keeps_wire_form() {
        let store = MemoryPoolStore::new();
        store.save(4, &sample()).await.unwrap();
        let raw = store.raw(4).await.unwrap();
        assert!(raw.contains(r#""kind":"map""#));
        assert_eq!(store.load(4).await.unwrap(), Some(sample()));
    }
}
