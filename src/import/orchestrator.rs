//! Import orchestration
//!
//! Writes a parsed batch to the health store, skipping readings the store
//! already holds. Readings are processed strictly in order, one at a time.

use serde::Serialize;

use super::duplicates::find_duplicates;
use crate::models::Reading;
use crate::store::{HealthStore, StoreResult};

/// Outcome of a completed import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportTally {
    pub imported: usize,
    pub skipped: usize,
}

impl ImportTally {
    pub fn total(&self) -> usize {
        self.imported + self.skipped
    }
}

/// Import `readings` into `store`.
///
/// `on_progress` receives the completed fraction after every reading, written
/// or skipped, so it reaches exactly 1.0 after the last one. The first store
/// error stops the import; readings already written stay written.
pub async fn import_batch<S, F>(
    readings: &[Reading],
    store: &S,
    mut on_progress: F,
) -> StoreResult<ImportTally>
where
    S: HealthStore + ?Sized,
    F: FnMut(f64),
{
    let mut tally = ImportTally::default();
    if readings.is_empty() {
        return Ok(tally);
    }

    let existing = find_duplicates(readings, store).await?;
    let total = readings.len() as f64;

    for (completed, reading) in readings.iter().enumerate() {
        if existing.contains(&reading.key()) {
            tracing::debug!(id = reading.id, "skipping duplicate {}", reading.key());
            tally.skipped += 1;
        } else {
            store.write(reading).await?;
            tally.imported += 1;
        }
        on_progress((completed + 1) as f64 / total);
    }

    tracing::info!(
        imported = tally.imported,
        skipped = tally.skipped,
        "import batch complete"
    );

    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::csv::parse;
    use crate::store::{MemoryHealthStore, StoreError, StoredPressure};
    use chrono::{Local, TimeZone, Utc};

    fn reading(id: usize, minute: u32, systolic: i32) -> Reading {
        Reading {
            id,
            timestamp: Local.with_ymd_and_hms(2025, 7, 28, 8, minute, 0).earliest().unwrap(),
            systolic,
            diastolic: 80,
            pulse: Some(62),
            irregular_pulse: false,
            source: "OxiPro BP2".to_string(),
        }
    }

    fn stored(r: &Reading) -> StoredPressure {
        StoredPressure {
            timestamp: r.timestamp.with_timezone(&Utc),
            systolic: r.systolic,
            diastolic: r.diastolic,
        }
    }

    #[tokio::test]
    async fn test_empty_batch_does_not_touch_store() {
        let store = MemoryHealthStore::new();
        let mut calls = 0;
        let tally = import_batch(&[], &store, |_| calls += 1).await.unwrap();

        assert_eq!(tally, ImportTally { imported: 0, skipped: 0 });
        assert_eq!(store.query_count(), 0);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_end_to_end_example() {
        let bytes = b"Date,Time,Sys,Dia,Pulse\n\
            2025-07-28,08:15,125,80,66\n\
            2025-07-28,12:00,,79,70\n\
            2025-07-28,20:45,122,78,64\n";
        let readings = parse(bytes).unwrap();
        assert_eq!(readings.len(), 2);
        assert!(readings[0].timestamp > readings[1].timestamp);

        let store = MemoryHealthStore::with_existing([stored(&readings[1])]);
        let tally = import_batch(&readings, &store, |_| {}).await.unwrap();

        assert_eq!(tally, ImportTally { imported: 1, skipped: 1 });
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.pressures().len(), 2);
    }

    #[tokio::test]
    async fn test_tally_covers_whole_batch_with_single_query() {
        let batch: Vec<Reading> = (0..6).map(|i| reading(i + 2, i as u32 * 5, 120 + i as i32)).collect();
        let store = MemoryHealthStore::with_existing([stored(&batch[1]), stored(&batch[4])]);

        let tally = import_batch(&batch, &store, |_| {}).await.unwrap();

        assert_eq!(tally.total(), batch.len());
        assert_eq!(tally.skipped, 2);
        assert_eq!(store.query_count(), 1);
        assert_eq!(store.heart_rates().len(), 4);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_reaches_one() {
        let batch: Vec<Reading> = (0..5).map(|i| reading(i + 2, i as u32, 120)).collect();
        let store = MemoryHealthStore::with_existing([stored(&batch[0]), stored(&batch[4])]);

        let mut progress = Vec::new();
        import_batch(&batch, &store, |p| progress.push(p)).await.unwrap();

        assert_eq!(progress.len(), batch.len());
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last().copied(), Some(1.0));
    }

    #[tokio::test]
    async fn test_write_failure_stops_without_rollback() {
        let batch: Vec<Reading> = (0..4).map(|i| reading(i + 2, i as u32, 120 + i as i32)).collect();
        let store = MemoryHealthStore::new().failing_after(2);

        let mut progress = Vec::new();
        let err = import_batch(&batch, &store, |p| progress.push(p)).await.unwrap_err();

        assert!(matches!(err, StoreError::WriteRejected { .. }));
        assert_eq!(store.pressures().len(), 2);
        assert_eq!(progress, vec![0.25, 0.5]);
    }

    #[tokio::test]
    async fn test_query_failure_propagates_before_writing() {
        let batch = vec![reading(2, 0, 120)];
        let store = MemoryHealthStore::new().denying_access();

        let err = import_batch(&batch, &store, |_| {}).await.unwrap_err();
        assert!(matches!(err, StoreError::AuthorizationDenied));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_identical_rows_in_one_file_are_both_written() {
        let batch = vec![reading(2, 0, 120), reading(3, 0, 120)];
        let store = MemoryHealthStore::new();

        let tally = import_batch(&batch, &store, |_| {}).await.unwrap();
        assert_eq!(tally, ImportTally { imported: 2, skipped: 0 });
    }
}
