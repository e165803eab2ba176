//! Health store port
//!
//! The importer only needs two things from the system of record for vitals:
//! write one reading, and list the blood pressure entries in a time range.

mod memory;
mod sqlite;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::DbError;
use crate::models::{Reading, ReadingKey};

pub use memory::{MemoryHealthStore, StoredHeartRate};
pub use sqlite::SqliteHealthStore;

/// Data types the store must support before it is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    BloodPressure,
    HeartRate,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::BloodPressure, Capability::HeartRate];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::BloodPressure => f.write_str("Blood pressure storage"),
            Capability::HeartRate => f.write_str("Heart rate storage"),
        }
    }
}

/// Store operation, for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Connect,
    Write,
    Query,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOperation::Connect => f.write_str("connect to"),
            StoreOperation::Write => f.write_str("save to"),
            StoreOperation::Query => f.write_str("query"),
        }
    }
}

/// Health store failures; any of these aborts the running import
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{capability} is not available in the health store")]
    Unavailable { capability: Capability },

    #[error("Health store authorization was denied")]
    AuthorizationDenied,

    #[error("Health store rejected the reading taken at {}", .timestamp.format("%Y-%m-%d %H:%M"))]
    WriteRejected { timestamp: DateTime<Local> },

    #[error("Health store entry {id} has an unreadable timestamp")]
    MalformedEntry { id: i64 },

    #[error("Failed to {operation} the health store: {source}")]
    Database {
        operation: StoreOperation,
        #[source]
        source: DbError,
    },
}

impl StoreError {
    /// Wrap a database error, recognising permission failures
    pub fn database(operation: StoreOperation, source: DbError) -> Self {
        if is_permission_denied(&source) {
            return StoreError::AuthorizationDenied;
        }
        StoreError::Database { operation, source }
    }
}

fn is_permission_denied(e: &DbError) -> bool {
    use rusqlite::ErrorCode;
    match e {
        DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => matches!(
            failure.code,
            ErrorCode::ReadOnly | ErrorCode::PermissionDenied | ErrorCode::AuthorizationForStatementDenied
        ),
        _ => false,
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A blood pressure entry already present in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredPressure {
    pub timestamp: DateTime<Utc>,
    pub systolic: i32,
    pub diastolic: i32,
}

impl StoredPressure {
    pub fn key(&self) -> ReadingKey {
        ReadingKey::new(&self.timestamp, self.systolic, self.diastolic)
    }
}

/// External system of record for vitals
#[async_trait]
pub trait HealthStore: Send + Sync {
    /// Persist one reading: a paired systolic/diastolic entry, plus a heart
    /// rate entry when the reading has a pulse. Both carry the source label.
    async fn write(&self, reading: &Reading) -> StoreResult<()>;

    /// Blood pressure entries whose timestamp lies in `[start, end]`
    async fn query(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> StoreResult<Vec<StoredPressure>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readonly_failure_maps_to_authorization_denied() {
        let failure = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
            Some("attempt to write a readonly database".into()),
        );
        let err = StoreError::database(StoreOperation::Write, DbError::Sqlite(failure));
        assert!(matches!(err, StoreError::AuthorizationDenied));
    }

    #[test]
    fn test_other_database_failures_keep_context() {
        let err = StoreError::database(
            StoreOperation::Query,
            DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows),
        );
        assert!(matches!(
            err,
            StoreError::Database { operation: StoreOperation::Query, .. }
        ));
        assert!(err.to_string().starts_with("Failed to query the health store"));
    }

    #[test]
    fn test_unavailable_message() {
        let err = StoreError::Unavailable { capability: Capability::HeartRate };
        assert_eq!(err.to_string(), "Heart rate storage is not available in the health store");
    }
}
