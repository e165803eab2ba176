//! Stored Readings MCP Tools
//!
//! Read-only view of the blood pressure readings in the health store.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::db::Database;
use crate::models::{parse_timestamp, Vital, VitalType};

const DEFAULT_RANGE_DAYS: i64 = 30;

/// A stored blood pressure reading with its paired pulse
#[derive(Debug, Serialize)]
pub struct StoredReadingSummary {
    pub id: i64,
    pub timestamp: String,
    pub blood_pressure: String,
    pub pulse: Option<i32>,
    pub source: String,
    pub group_id: Option<i64>,
}

/// Response for list_stored_readings
#[derive(Debug, Serialize)]
pub struct ListStoredReadingsResponse {
    pub start: String,
    pub end: String,
    pub readings: Vec<StoredReadingSummary>,
    pub total: usize,
}

/// Parse a `YYYY-MM-DD` date as local midnight, or the last second of the day
fn parse_local_date(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}'. Expected YYYY-MM-DD", value))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        Some(NaiveTime::MIN)
    };
    let time = time.ok_or_else(|| "Invalid time of day".to_string())?;

    date.and_time(time)
        .and_local_timezone(Local)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("Date '{}' does not exist in the local time zone", value))
}

/// List stored readings between two dates (inclusive), newest first.
///
/// Defaults to the last 30 days.
pub fn list_stored_readings(
    db: &Database,
    start_date: Option<&str>,
    end_date: Option<&str>,
    limit: usize,
) -> Result<ListStoredReadingsResponse, String> {
    let end = match end_date {
        Some(d) => parse_local_date(d, true)?,
        None => Utc::now(),
    };
    let start = match start_date {
        Some(d) => parse_local_date(d, false)?,
        None => end - Duration::days(DEFAULT_RANGE_DAYS),
    };
    if start > end {
        return Err("start_date must not be after end_date".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let pressures = Vital::list_by_date_range(&conn, VitalType::BloodPressure, &start, &end)
        .map_err(|e| format!("Failed to list readings: {}", e))?;
    let total = pressures.len();

    let mut readings = Vec::new();
    for vital in pressures.into_iter().take(limit) {
        let pulse = match vital.group_id {
            Some(group_id) => Vital::list_by_group(&conn, group_id)
                .map_err(|e| format!("Failed to get group vitals: {}", e))?
                .into_iter()
                .find(|v| v.vital_type == VitalType::HeartRate)
                .map(|v| v.value1 as i32),
            None => None,
        };

        let timestamp = parse_timestamp(&vital.timestamp)
            .map(|ts| ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| vital.timestamp.clone());

        readings.push(StoredReadingSummary {
            id: vital.id,
            timestamp,
            blood_pressure: vital.format_value(),
            pulse,
            source: vital.source,
            group_id: vital.group_id,
        });
    }

    Ok(ListStoredReadingsResponse {
        start: start.to_rfc3339(),
        end: end.to_rfc3339(),
        readings,
        total,
    })
}
