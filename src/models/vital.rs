//! Vital model
//!
//! Blood pressure and heart rate entries as stored by the SQLite health store.
//! A reading is saved as a vital group linking its blood pressure vital and,
//! when a pulse was measured, a heart rate vital.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// Storage format of every timestamp column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format an instant for storage
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp back into an instant
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Vital type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalType {
    BloodPressure,
    HeartRate,
}

impl VitalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VitalType::BloodPressure => "blood_pressure",
            VitalType::HeartRate => "heart_rate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "blood_pressure" | "bp" => Some(VitalType::BloodPressure),
            "heart_rate" | "hr" | "pulse" => Some(VitalType::HeartRate),
            _ => None,
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            VitalType::BloodPressure => "mmHg",
            VitalType::HeartRate => "bpm",
        }
    }
}

/// Data for creating a vital group
#[derive(Debug, Clone)]
pub struct VitalGroupCreate {
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Group linking the vitals of one reading
pub struct VitalGroup;

impl VitalGroup {
    /// Insert a group and return its id
    pub fn create(conn: &Connection, data: &VitalGroupCreate) -> DbResult<i64> {
        conn.execute(
            r#"
            INSERT INTO vital_groups (description, timestamp, notes)
            VALUES (?1, ?2, ?3)
            "#,
            params![data.description, format_timestamp(&data.timestamp), data.notes],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// A stored vital sign entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vital {
    pub id: i64,
    pub vital_type: VitalType,
    pub timestamp: String,
    pub value1: f64,
    pub value2: Option<f64>,
    pub unit: String,
    pub source: String,
    pub group_id: Option<i64>,
    pub created_at: String,
}

/// Data for creating a new vital
#[derive(Debug, Clone)]
pub struct VitalCreate {
    pub vital_type: VitalType,
    pub timestamp: DateTime<Utc>,
    pub value1: f64,
    pub value2: Option<f64>,
    pub source: String,
    pub group_id: Option<i64>,
}

impl Vital {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let vital_type_str: String = row.get("vital_type")?;
        let vital_type = VitalType::from_str(&vital_type_str).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(
                0,
                format!("vital_type '{}'", vital_type_str),
                rusqlite::types::Type::Text,
            )
        })?;

        Ok(Self {
            id: row.get("id")?,
            vital_type,
            timestamp: row.get("timestamp")?,
            value1: row.get("value1")?,
            value2: row.get("value2")?,
            unit: row.get("unit")?,
            source: row.get("source")?,
            group_id: row.get("group_id")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Insert a vital and return its id
    pub fn create(conn: &Connection, data: &VitalCreate) -> DbResult<i64> {
        conn.execute(
            r#"
            INSERT INTO vitals (vital_type, timestamp, value1, value2, unit, source, group_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                data.vital_type.as_str(),
                format_timestamp(&data.timestamp),
                data.value1,
                data.value2,
                data.vital_type.default_unit(),
                data.source,
                data.group_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List vitals of one type whose timestamp lies in the closed range, newest first
    pub fn list_by_date_range(
        conn: &Connection,
        vital_type: VitalType,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"SELECT * FROM vitals
               WHERE vital_type = ?1 AND timestamp >= ?2 AND timestamp <= ?3
               ORDER BY timestamp DESC"#,
        )?;
        let vitals = stmt
            .query_map(
                params![vital_type.as_str(), format_timestamp(start), format_timestamp(end)],
                Self::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(vitals)
    }

    /// List vitals linked to a group
    pub fn list_by_group(conn: &Connection, group_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM vitals WHERE group_id = ?1 ORDER BY vital_type, timestamp",
        )?;
        let vitals = stmt
            .query_map([group_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(vitals)
    }

    /// Format the vital for display
    pub fn format_value(&self) -> String {
        match self.vital_type {
            VitalType::BloodPressure => {
                let diastolic = self.value2.unwrap_or(0.0);
                format!("{}/{} {}", self.value1 as i32, diastolic as i32, self.unit)
            }
            VitalType::HeartRate => format!("{} {}", self.value1 as i32, self.unit),
        }
    }
}
