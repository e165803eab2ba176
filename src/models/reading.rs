//! Reading model
//!
//! One blood pressure observation parsed from a monitor export, plus the
//! factory that builds it from a row of named CSV fields.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column names recognised in monitor exports
pub mod columns {
    pub const DATE: &str = "Date";
    pub const TIME: &str = "Time";
    pub const SYSTOLIC: &str = "Sys";
    pub const DIASTOLIC: &str = "Dia";
    pub const PULSE: &str = "Pulse";
    pub const IRREGULAR_PULSE: &str = "Irregular pulse";
    pub const SOURCE: &str = "Source";

    /// Columns every export header must name
    pub const REQUIRED: [&str; 4] = [DATE, TIME, SYSTOLIC, DIASTOLIC];
}

/// Value of the `Irregular pulse` column that flags an irregular rhythm
pub const IRREGULAR_PULSE_DETECTED: &str = "detected";

/// Source label used when the export does not name one
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Combined date/time format of the `Date` and `Time` columns
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A data row keyed by header name
pub type CsvRow<'a> = HashMap<&'a str, &'a str>;

/// Row-level failures; the row is skipped, the file is not
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowError {
    #[error("Invalid date or time format: '{value}'")]
    InvalidDateFormat { value: String },

    #[error("Invalid blood pressure values (Sys: {}, Dia: {})", show(.systolic), show(.diastolic))]
    InvalidBloodPressureValues {
        systolic: Option<String>,
        diastolic: Option<String>,
    },
}

fn show(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("'{}'", v),
        None => "missing".to_string(),
    }
}

/// A single blood pressure reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Line number of the row in the source file
    pub id: usize,
    pub timestamp: DateTime<Local>,
    pub systolic: i32,
    pub diastolic: i32,
    pub pulse: Option<i32>,
    pub irregular_pulse: bool,
    pub source: String,
}

impl Reading {
    /// Build a reading from one CSV row.
    ///
    /// `line` becomes the reading's id, so parsing the same file twice yields
    /// identical readings.
    pub fn from_csv_row(row: &CsvRow, line: usize, date: &str, time: &str) -> Result<Self, RowError> {
        let timestamp = parse_local_timestamp(date, time)?;

        let sys = row.get(columns::SYSTOLIC).copied();
        let dia = row.get(columns::DIASTOLIC).copied();
        let (systolic, diastolic) = match (
            sys.and_then(|v| v.parse::<i32>().ok()),
            dia.and_then(|v| v.parse::<i32>().ok()),
        ) {
            (Some(s), Some(d)) => (s, d),
            _ => {
                return Err(RowError::InvalidBloodPressureValues {
                    systolic: sys.map(String::from),
                    diastolic: dia.map(String::from),
                })
            }
        };

        let pulse = row
            .get(columns::PULSE)
            .and_then(|v| v.parse::<i32>().ok());

        let irregular_pulse = row
            .get(columns::IRREGULAR_PULSE)
            .is_some_and(|v| *v == IRREGULAR_PULSE_DETECTED);

        let source = match row.get(columns::SOURCE) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => UNKNOWN_SOURCE.to_string(),
        };

        Ok(Self {
            id: line,
            timestamp,
            systolic,
            diastolic,
            pulse,
            irregular_pulse,
            source,
        })
    }

    /// Duplicate identity of this reading
    pub fn key(&self) -> ReadingKey {
        ReadingKey::new(&self.timestamp, self.systolic, self.diastolic)
    }

    /// Format as "120/80"
    pub fn pressure_display(&self) -> String {
        format!("{}/{}", self.systolic, self.diastolic)
    }
}

/// Parse `date` + `time` in the process's local time zone.
///
/// Nonexistent local times (DST gap) are rejected; ambiguous ones (DST
/// overlap) resolve to the earlier instant.
fn parse_local_timestamp(date: &str, time: &str) -> Result<DateTime<Local>, RowError> {
    let value = format!("{} {}", date, time);
    NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .ok_or(RowError::InvalidDateFormat { value })
}

/// Exact duplicate identity: instant (whole seconds) plus both pressures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReadingKey {
    pub timestamp: i64,
    pub systolic: i32,
    pub diastolic: i32,
}

impl ReadingKey {
    pub fn new<Tz: TimeZone>(timestamp: &DateTime<Tz>, systolic: i32, diastolic: i32) -> Self {
        Self {
            timestamp: timestamp.timestamp(),
            systolic,
            diastolic,
        }
    }
}

impl fmt::Display for ReadingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} @ {}", self.systolic, self.diastolic, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row<'a>(pairs: &[(&'a str, &'a str)]) -> CsvRow<'a> {
        pairs.iter().copied().collect()
    }

    fn base_row() -> CsvRow<'static> {
        row(&[
            ("Date", "2025-07-28"),
            ("Time", "08:15"),
            ("Sys", "128"),
            ("Dia", "82"),
            ("Pulse", "64"),
            ("Irregular pulse", "detected"),
            ("Source", "OxiPro BP2"),
        ])
    }

    #[test]
    fn test_from_csv_row_full() {
        let reading = Reading::from_csv_row(&base_row(), 2, "2025-07-28", "08:15").unwrap();

        assert_eq!(reading.id, 2);
        assert_eq!(reading.systolic, 128);
        assert_eq!(reading.diastolic, 82);
        assert_eq!(reading.pulse, Some(64));
        assert!(reading.irregular_pulse);
        assert_eq!(reading.source, "OxiPro BP2");
        assert_eq!(
            reading.timestamp.naive_local(),
            NaiveDateTime::parse_from_str("2025-07-28 08:15", TIMESTAMP_FORMAT).unwrap()
        );
    }

    #[test]
    fn test_invalid_date_format() {
        let err = Reading::from_csv_row(&base_row(), 2, "28/07/2025", "08:15").unwrap_err();
        assert_eq!(
            err,
            RowError::InvalidDateFormat {
                value: "28/07/2025 08:15".to_string()
            }
        );

        let err = Reading::from_csv_row(&base_row(), 2, "2025-07-28", "8am").unwrap_err();
        assert!(matches!(err, RowError::InvalidDateFormat { .. }));
    }

    #[test]
    fn test_missing_or_non_integer_pressure() {
        let mut r = base_row();
        r.remove("Sys");
        let err = Reading::from_csv_row(&r, 3, "2025-07-28", "08:15").unwrap_err();
        assert_eq!(
            err,
            RowError::InvalidBloodPressureValues {
                systolic: None,
                diastolic: Some("82".to_string()),
            }
        );

        let mut r = base_row();
        r.insert("Dia", "82.5");
        let err = Reading::from_csv_row(&r, 3, "2025-07-28", "08:15").unwrap_err();
        assert!(matches!(err, RowError::InvalidBloodPressureValues { .. }));
        assert!(err.to_string().contains("'82.5'"));
    }

    #[test]
    fn test_pulse_is_optional() {
        let mut r = base_row();
        r.insert("Pulse", "--");
        let reading = Reading::from_csv_row(&r, 2, "2025-07-28", "08:15").unwrap();
        assert_eq!(reading.pulse, None);

        r.remove("Pulse");
        let reading = Reading::from_csv_row(&r, 2, "2025-07-28", "08:15").unwrap();
        assert_eq!(reading.pulse, None);
    }

    #[test]
    fn test_irregular_pulse_is_case_sensitive() {
        let mut r = base_row();
        r.insert("Irregular pulse", "Detected");
        let reading = Reading::from_csv_row(&r, 2, "2025-07-28", "08:15").unwrap();
        assert!(!reading.irregular_pulse);

        r.remove("Irregular pulse");
        let reading = Reading::from_csv_row(&r, 2, "2025-07-28", "08:15").unwrap();
        assert!(!reading.irregular_pulse);
    }

    #[test]
    fn test_source_defaults_to_unknown() {
        let mut r = base_row();
        r.insert("Source", "");
        let reading = Reading::from_csv_row(&r, 2, "2025-07-28", "08:15").unwrap();
        assert_eq!(reading.source, UNKNOWN_SOURCE);

        r.remove("Source");
        let reading = Reading::from_csv_row(&r, 2, "2025-07-28", "08:15").unwrap();
        assert_eq!(reading.source, UNKNOWN_SOURCE);
    }

    #[test]
    fn test_same_row_builds_same_reading() {
        let a = Reading::from_csv_row(&base_row(), 5, "2025-07-28", "08:15").unwrap();
        let b = Reading::from_csv_row(&base_row(), 5, "2025-07-28", "08:15").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_matches_across_time_zones() {
        let reading = Reading::from_csv_row(&base_row(), 2, "2025-07-28", "08:15").unwrap();
        let utc = reading.timestamp.with_timezone(&chrono::Utc);
        assert_eq!(reading.key(), ReadingKey::new(&utc, 128, 82));
        assert_ne!(reading.key(), ReadingKey::new(&utc, 129, 82));
    }
}
