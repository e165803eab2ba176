//! Import history log
//!
//! Bounded, newest-first audit trail of import attempts. The whole log is
//! written to the key-value store after every change.

use std::sync::Arc;

use chrono::Local;
use thiserror::Error;

use super::kv::KeyValueStore;
use crate::db::DbError;
use crate::models::{ImportRecord, Reading};

/// Records kept before the oldest are dropped
pub const MAX_RECORDS: usize = 50;

/// Key the serialized log is stored under
pub const HISTORY_KEY: &str = "import_history";

/// Failures while saving or restoring the log
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to encode import history: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode import history: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Import history storage error: {0}")]
    Storage(#[from] DbError),
}

/// Called with the current records after every mutation
pub type HistoryListener = Box<dyn Fn(&[ImportRecord]) + Send + Sync>;

pub struct HistoryLog {
    records: Vec<ImportRecord>,
    store: Arc<dyn KeyValueStore>,
    listeners: Vec<HistoryListener>,
}

impl HistoryLog {
    /// Restore the log from `store`.
    ///
    /// Missing or unreadable data yields an empty log.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let records = match read_records(store.as_ref()) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Starting with empty import history: {}", e);
                Vec::new()
            }
        };

        Self {
            records,
            store,
            listeners: Vec::new(),
        }
    }

    /// Record an import attempt as the newest entry
    pub fn append(
        &mut self,
        file_name: &str,
        readings: &[Reading],
        success: bool,
        error_message: Option<String>,
    ) {
        let record = ImportRecord::new(file_name, readings, success, error_message, Local::now());
        tracing::debug!(
            file_name,
            success,
            reading_count = record.reading_count,
            "recording import attempt"
        );

        self.records.insert(0, record);
        self.records.truncate(MAX_RECORDS);
        self.persist();
        self.notify();
    }

    /// Drop every record, in memory and in storage
    pub fn clear(&mut self) {
        self.records.clear();
        if let Err(e) = self.store.remove(HISTORY_KEY) {
            tracing::warn!("Failed to remove persisted import history: {}", e);
        }
        self.notify();
    }

    /// Write the full log to storage. Failures are logged only.
    pub fn persist(&self) {
        if let Err(e) = self.try_persist() {
            tracing::warn!("{}", e);
        }
    }

    fn try_persist(&self) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_vec(&self.records).map_err(PersistenceError::Encode)?;
        self.store.set(HISTORY_KEY, &encoded)?;
        Ok(())
    }

    /// Records, newest first
    pub fn records(&self) -> &[ImportRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&ImportRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Register a listener for changes to the log
    pub fn subscribe(&mut self, listener: HistoryListener) {
        self.listeners.push(listener);
    }

    fn notify(&self) {
        for listener in &self.listeners {
            listener(&self.records);
        }
    }
}

fn read_records(store: &dyn KeyValueStore) -> Result<Vec<ImportRecord>, PersistenceError> {
    match store.get(HISTORY_KEY)? {
        Some(bytes) => serde_json::from_slice(&bytes).map_err(PersistenceError::Decode),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::db::Database;
    use crate::history::kv::{MemoryKeyValueStore, SqliteKeyValueStore};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn reading(id: usize, day: u32) -> Reading {
        Reading {
            id,
            timestamp: Local.with_ymd_and_hms(2025, 7, day, 8, 15, 0).earliest().unwrap(),
            systolic: 125,
            diastolic: 80,
            pulse: Some(66),
            irregular_pulse: false,
            source: "OxiPro BP2".to_string(),
        }
    }

    fn memory_log() -> (Arc<MemoryKeyValueStore>, HistoryLog) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let log = HistoryLog::load(store.clone());
        (store, log)
    }

    #[test]
    fn test_append_is_newest_first_and_bounded() {
        let (_, mut log) = memory_log();
        for i in 0..=MAX_RECORDS {
            log.append(&format!("file_{}.csv", i), &[], true, None);
        }

        assert_eq!(log.len(), MAX_RECORDS);
        assert_eq!(log.records()[0].file_name, format!("file_{}.csv", MAX_RECORDS));
        assert_eq!(log.records()[MAX_RECORDS - 1].file_name, "file_1.csv");
        assert!(log.records().iter().all(|r| r.file_name != "file_0.csv"));
    }

    #[test]
    fn test_append_labels_and_snapshot() {
        let (_, mut log) = memory_log();
        let batch = vec![reading(2, 28), reading(3, 26)];

        log.append("july.csv", &batch, true, None);
        log.append("broken.csv", &batch, false, Some("Health store authorization was denied".into()));

        let failed = log.get(0).unwrap();
        assert!(!failed.success);
        assert!(failed.readings.is_none());
        assert_eq!(failed.reading_count, 2);

        let ok = log.get(1).unwrap();
        assert_eq!(ok.date_range_label, "2025-07-26 to 2025-07-28");
        assert_eq!(ok.readings.as_ref().map(Vec::len), Some(2));
        assert!(ok.error_message.is_none());

        assert!(log.get(2).is_none());
    }

    #[test]
    fn test_append_persists_and_reloads() {
        let (store, mut log) = memory_log();
        log.append("july.csv", &[reading(2, 28)], true, None);

        let reloaded = HistoryLog::load(store);
        assert_eq!(reloaded.records(), log.records());
    }

    #[test]
    fn test_corrupt_history_loads_empty() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.set(HISTORY_KEY, b"{not json").unwrap();

        let log = HistoryLog::load(store);
        assert!(log.is_empty());
    }

    #[test]
    fn test_clear_removes_persisted_key() {
        let (store, mut log) = memory_log();
        log.append("july.csv", &[], true, None);
        assert!(store.get(HISTORY_KEY).unwrap().is_some());

        log.clear();
        assert!(log.is_empty());
        assert!(store.get(HISTORY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_listeners_see_every_mutation() {
        let (_, mut log) = memory_log();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        log.subscribe(Box::new(move |records: &[ImportRecord]| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert!(records.len() <= MAX_RECORDS);
        }));

        log.append("a.csv", &[], true, None);
        log.append("b.csv", &[], false, Some("empty".into()));
        log.clear();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_history_survives_sqlite_reload() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("history.db")).unwrap();
        db.with_conn(run_migrations).unwrap();

        let mut log = HistoryLog::load(Arc::new(SqliteKeyValueStore::new(db.clone())));
        log.append("july.csv", &[reading(2, 28), reading(3, 27)], true, None);

        let reloaded = HistoryLog::load(Arc::new(SqliteKeyValueStore::new(db)));
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.records()[0].date_range_label, "2025-07-27 to 2025-07-28");
        assert_eq!(reloaded.records()[0].readings.as_ref().map(Vec::len), Some(2));
    }
}
