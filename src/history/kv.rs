//! Key-value persistence
//!
//! A minimal named-blob facility. The history log keeps its whole serialized
//! form under a single key.

use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::{params, OptionalExtension};

use crate::db::{Database, DbResult};

/// Storage for named blobs
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> DbResult<()>;
    fn remove(&self, key: &str) -> DbResult<()>;
}

/// Key-value store on the `key_value` table
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    db: Database,
}

impl SqliteKeyValueStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        self.db.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM key_value WHERE key = ?1", [key], |row| row.get(0))
                .optional()?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> DbResult<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO key_value (key, value)
                VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = datetime('now')
                "#,
                params![key, value],
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> DbResult<()> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM key_value WHERE key = ?1", [key])?;
            Ok(())
        })
    }
}

/// Process-local key-value store
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> DbResult<()> {
        self.values().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> DbResult<()> {
        self.values().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use tempfile::TempDir;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("history").unwrap(), None);

        store.set("history", b"[1]").unwrap();
        store.set("history", b"[1,2]").unwrap();
        assert_eq!(store.get("history").unwrap().as_deref(), Some(&b"[1,2]"[..]));

        store.remove("history").unwrap();
        assert_eq!(store.get("history").unwrap(), None);
        store.remove("history").unwrap();
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryKeyValueStore::new());
    }

    #[test]
    fn test_sqlite_store() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("kv.db")).unwrap();
        db.with_conn(run_migrations).unwrap();

        exercise(&SqliteKeyValueStore::new(db));
    }
}
