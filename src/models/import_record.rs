//! Import record model
//!
//! One audit entry per import attempt, kept in the history log.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::Reading;

/// Label used when an attempt carried no readings
pub const NO_DATE_RANGE: &str = "N/A";

/// Audit entry for a single import attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub file_name: String,
    pub import_timestamp: DateTime<Local>,
    pub reading_count: usize,
    pub date_range_label: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Snapshot of the batch, kept only for successful imports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readings: Option<Vec<Reading>>,
}

impl ImportRecord {
    /// Build a record stamped with `import_timestamp`.
    ///
    /// The readings snapshot is dropped unless `success` is set.
    pub fn new(
        file_name: &str,
        readings: &[Reading],
        success: bool,
        error_message: Option<String>,
        import_timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            file_name: file_name.to_string(),
            import_timestamp,
            reading_count: readings.len(),
            date_range_label: date_range_label(readings),
            success,
            error_message: if success { None } else { error_message },
            readings: success.then(|| readings.to_vec()),
        }
    }
}

/// "YYYY-MM-DD to YYYY-MM-DD" spanning the oldest and newest reading
pub fn date_range_label(readings: &[Reading]) -> String {
    let first = readings.iter().map(|r| r.timestamp).min();
    let last = readings.iter().map(|r| r.timestamp).max();
    match (first, last) {
        (Some(start), Some(end)) => format!(
            "{} to {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ),
        _ => NO_DATE_RANGE.to_string(),
    }
}
