//! In-memory health store
//!
//! A fake with no platform dependency. Supports seeding existing entries and
//! injecting failures so import behaviour can be exercised end to end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};

use super::{HealthStore, StoreError, StoreResult, StoredPressure};
use crate::models::Reading;

/// A heart rate entry written alongside a pressure pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHeartRate {
    pub timestamp: DateTime<Utc>,
    pub bpm: i32,
    pub source: String,
}

#[derive(Default)]
struct Entries {
    pressures: Vec<(StoredPressure, String)>,
    heart_rates: Vec<StoredHeartRate>,
}

/// Health store that keeps everything in process memory
#[derive(Default)]
pub struct MemoryHealthStore {
    entries: Mutex<Entries>,
    writes: AtomicUsize,
    queries: AtomicUsize,
    /// Writes beyond this many successful ones are rejected
    fail_after: Option<usize>,
    deny_access: bool,
}

impl MemoryHealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with entries that already exist in the store
    pub fn with_existing(entries: impl IntoIterator<Item = StoredPressure>) -> Self {
        let store = Self::default();
        {
            let mut guard = store.lock();
            guard.pressures = entries
                .into_iter()
                .map(|p| (p, "Existing".to_string()))
                .collect();
        }
        store
    }

    /// Reject every write after `count` successful ones
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Refuse all access as if authorization had been denied
    pub fn denying_access(mut self) -> Self {
        self.deny_access = true;
        self
    }

    /// Pressure entries currently stored, in insertion order
    pub fn pressures(&self) -> Vec<StoredPressure> {
        self.lock().pressures.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn heart_rates(&self) -> Vec<StoredHeartRate> {
        self.lock().heart_rates.clone()
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of range queries issued
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        // A panic while holding the lock leaves the vectors intact
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl HealthStore for MemoryHealthStore {
    async fn write(&self, reading: &Reading) -> StoreResult<()> {
        if self.deny_access {
            return Err(StoreError::AuthorizationDenied);
        }
        if self.fail_after.is_some_and(|limit| self.write_count() >= limit) {
            return Err(StoreError::WriteRejected {
                timestamp: reading.timestamp,
            });
        }

        let timestamp = reading.timestamp.with_timezone(&Utc);
        let mut entries = self.lock();
        entries.pressures.push((
            StoredPressure {
                timestamp,
                systolic: reading.systolic,
                diastolic: reading.diastolic,
            },
            reading.source.clone(),
        ));
        if let Some(bpm) = reading.pulse {
            entries.heart_rates.push(StoredHeartRate {
                timestamp,
                bpm,
                source: reading.source.clone(),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> StoreResult<Vec<StoredPressure>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.deny_access {
            return Err(StoreError::AuthorizationDenied);
        }

        let (start, end) = (start.with_timezone(&Utc), end.with_timezone(&Utc));
        Ok(self
            .lock()
            .pressures
            .iter()
            .map(|(p, _)| p)
            .filter(|p| p.timestamp >= start && p.timestamp <= end)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reading(minute: u32, pulse: Option<i32>) -> Reading {
        Reading {
            id: minute as usize,
            timestamp: Local.with_ymd_and_hms(2025, 7, 28, 8, minute, 0).earliest().unwrap(),
            systolic: 120,
            diastolic: 80,
            pulse,
            irregular_pulse: false,
            source: "OxiPro BP2".to_string(),
        }
    }

    #[tokio::test]
    async fn test_query_range_is_closed() {
        let store = MemoryHealthStore::new();
        let r = reading(15, Some(60));
        store.write(&r).await.unwrap();

        let hits = store.query(r.timestamp, r.timestamp).await.unwrap();
        assert_eq!(hits.len(), 1);

        let misses = store
            .query(r.timestamp + Duration::seconds(1), r.timestamp + Duration::minutes(5))
            .await
            .unwrap();
        assert!(misses.is_empty());
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_heart_rate_written_with_pulse() {
        let store = MemoryHealthStore::new();
        store.write(&reading(15, Some(60))).await.unwrap();
        store.write(&reading(20, None)).await.unwrap();

        assert_eq!(store.pressures().len(), 2);
        assert_eq!(store.heart_rates().len(), 1);
        assert_eq!(store.heart_rates()[0].source, "OxiPro BP2");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryHealthStore::new().failing_after(1);
        store.write(&reading(15, None)).await.unwrap();
        let err = store.write(&reading(20, None)).await.unwrap_err();
        assert!(matches!(err, StoreError::WriteRejected { .. }));
        assert_eq!(store.write_count(), 1);

        let denied = MemoryHealthStore::new().denying_access();
        assert!(matches!(
            denied.write(&reading(15, None)).await,
            Err(StoreError::AuthorizationDenied)
        ));
    }
}
