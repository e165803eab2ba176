//! Server Status Tool
//!
//! Provides runtime status information about the import service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

use crate::build_info::BuildInfo;
use crate::db::migrations::get_schema_version;
use crate::db::Database;

/// Service status snapshot
#[derive(Debug, Serialize)]
pub struct ServerStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Database information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,
    pub schema_version: Option<i32>,

    /// Import history
    pub history_records: usize,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
}

impl StatusTracker {
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
        }
    }

    /// Get the current status
    pub fn get_status(&self, db: &Database, history_records: usize) -> ServerStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let schema_version = db
            .with_conn(get_schema_version)
            .map_err(|e| tracing::warn!("Failed to read schema version: {}", e))
            .ok();

        ServerStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            schema_version,
            history_records,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: std::process::id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::{run_migrations, SCHEMA_VERSION};
    use tempfile::TempDir;

    #[test]
    fn test_status_reports_database_and_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.db");
        let db = Database::new(&path).unwrap();
        db.with_conn(run_migrations).unwrap();

        let status = StatusTracker::new(path.clone()).get_status(&db, 3);
        assert_eq!(status.schema_version, Some(SCHEMA_VERSION));
        assert_eq!(status.history_records, 3);
        assert_eq!(status.database_path, path.display().to_string());
        assert!(status.database_size_bytes.is_some());
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }
}
