//! Duplicate detection
//!
//! Finds which readings of a batch are already in the health store.

use std::collections::HashSet;

use chrono::Duration;

use crate::models::{Reading, ReadingKey};
use crate::store::{HealthStore, StoreResult};

/// Slack added on both sides of the batch's time span when querying the store
pub const QUERY_WINDOW_PADDING_SECS: i64 = 60;

/// Keys of every store entry in the batch's time window.
///
/// A batch reading is a duplicate only when its exact key is in the returned
/// set. One query is issued for the whole batch; none for an empty one.
pub async fn find_duplicates<S>(batch: &[Reading], store: &S) -> StoreResult<HashSet<ReadingKey>>
where
    S: HealthStore + ?Sized,
{
    let Some(min) = batch.iter().map(|r| r.timestamp).min() else {
        return Ok(HashSet::new());
    };
    let max = batch.iter().map(|r| r.timestamp).max().unwrap_or(min);

    let padding = Duration::seconds(QUERY_WINDOW_PADDING_SECS);
    let existing = store.query(min - padding, max + padding).await?;

    tracing::debug!(
        existing = existing.len(),
        "queried health store from {} to {}",
        min - padding,
        max + padding
    );

    Ok(existing.iter().map(|entry| entry.key()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryHealthStore, StoredPressure};
    use chrono::{DateTime, Local, TimeZone, Utc};

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 7, 28, hour, minute, second).earliest().unwrap()
    }

    fn reading(timestamp: DateTime<Local>, systolic: i32, diastolic: i32) -> Reading {
        Reading {
            id: 2,
            timestamp,
            systolic,
            diastolic,
            pulse: None,
            irregular_pulse: false,
            source: "OxiPro BP2".to_string(),
        }
    }

    fn existing(timestamp: DateTime<Local>, systolic: i32, diastolic: i32) -> StoredPressure {
        StoredPressure {
            timestamp: timestamp.with_timezone(&Utc),
            systolic,
            diastolic,
        }
    }

    #[tokio::test]
    async fn test_exact_match_is_duplicate() {
        let t = at(8, 15, 0);
        let store = MemoryHealthStore::with_existing([existing(t, 120, 80)]);

        let same = reading(t, 120, 80);
        let different = reading(t, 121, 80);
        let keys = find_duplicates(&[same.clone(), different.clone()], &store).await.unwrap();

        assert!(keys.contains(&same.key()));
        assert!(!keys.contains(&different.key()));
    }

    #[tokio::test]
    async fn test_one_second_drift_is_not_duplicate() {
        let store = MemoryHealthStore::with_existing([existing(at(8, 15, 1), 120, 80)]);
        let batch = [reading(at(8, 15, 0), 120, 80)];

        let keys = find_duplicates(&batch, &store).await.unwrap();
        // Entry is inside the padded window but does not match exactly
        assert_eq!(keys.len(), 1);
        assert!(!keys.contains(&batch[0].key()));
    }

    #[tokio::test]
    async fn test_window_is_padded() {
        let store = MemoryHealthStore::with_existing([
            existing(at(7, 59, 0), 110, 70),
            existing(at(7, 58, 59), 111, 71),
            existing(at(9, 1, 0), 112, 72),
            existing(at(9, 1, 1), 113, 73),
        ]);
        let batch = [reading(at(9, 0, 0), 120, 80), reading(at(8, 0, 0), 121, 81)];

        let keys = find_duplicates(&batch, &store).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&ReadingKey::new(&at(7, 59, 0), 110, 70)));
        assert!(keys.contains(&ReadingKey::new(&at(9, 1, 0), 112, 72)));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_query() {
        let store = MemoryHealthStore::new();
        let keys = find_duplicates(&[], &store).await.unwrap();

        assert!(keys.is_empty());
        assert_eq!(store.query_count(), 0);
    }
}
