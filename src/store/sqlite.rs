//! SQLite health store
//!
//! Saves each reading as a vital group holding a blood pressure vital and an
//! optional heart rate vital.

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};

use super::{Capability, HealthStore, StoreError, StoreOperation, StoreResult, StoredPressure};
use crate::db::{table_exists, Database, DbResult};
use crate::models::{
    parse_timestamp, Reading, Vital, VitalCreate, VitalGroup, VitalGroupCreate, VitalType,
};

const GROUP_DESCRIPTION: &str = "Imported BP reading";
const IRREGULAR_PULSE_NOTE: &str = "Irregular pulse detected";

/// Health store backed by the local SQLite database
#[derive(Clone)]
pub struct SqliteHealthStore {
    db: Database,
}

impl SqliteHealthStore {
    /// Connect after checking every capability the importer relies on.
    ///
    /// Fails with [`StoreError::Unavailable`] when the schema cannot hold one
    /// of them (for example, migrations have not run).
    pub fn connect(db: Database) -> StoreResult<Self> {
        for capability in Capability::ALL {
            let supported = db
                .with_conn(|conn| supports(conn, capability))
                .map_err(|e| StoreError::database(StoreOperation::Connect, e))?;
            if !supported {
                return Err(StoreError::Unavailable { capability });
            }
        }
        Ok(Self { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn supports(conn: &rusqlite::Connection, capability: Capability) -> DbResult<bool> {
    match capability {
        // Pressure pairs are linked through a group
        Capability::BloodPressure => Ok(table_exists(conn, "vitals")? && table_exists(conn, "vital_groups")?),
        Capability::HeartRate => table_exists(conn, "vitals"),
    }
}

fn save_reading(conn: &mut rusqlite::Connection, reading: &Reading) -> DbResult<()> {
    let timestamp = reading.timestamp.with_timezone(&Utc);
    let tx = conn.transaction()?;

    let group_id = VitalGroup::create(
        &tx,
        &VitalGroupCreate {
            description: Some(GROUP_DESCRIPTION.to_string()),
            timestamp,
            notes: reading.irregular_pulse.then(|| IRREGULAR_PULSE_NOTE.to_string()),
        },
    )?;

    Vital::create(
        &tx,
        &VitalCreate {
            vital_type: VitalType::BloodPressure,
            timestamp,
            value1: reading.systolic as f64,
            value2: Some(reading.diastolic as f64),
            source: reading.source.clone(),
            group_id: Some(group_id),
        },
    )?;

    if let Some(pulse) = reading.pulse {
        Vital::create(
            &tx,
            &VitalCreate {
                vital_type: VitalType::HeartRate,
                timestamp,
                value1: pulse as f64,
                value2: None,
                source: reading.source.clone(),
                group_id: Some(group_id),
            },
        )?;
    }

    tx.commit()?;
    Ok(())
}

#[async_trait]
impl HealthStore for SqliteHealthStore {
    async fn write(&self, reading: &Reading) -> StoreResult<()> {
        self.db
            .with_conn_mut(|conn| save_reading(conn, reading))
            .map_err(|e| StoreError::database(StoreOperation::Write, e))
    }

    async fn query(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> StoreResult<Vec<StoredPressure>> {
        let vitals = self
            .db
            .with_conn(|conn| {
                Vital::list_by_date_range(
                    conn,
                    VitalType::BloodPressure,
                    &start.with_timezone(&Utc),
                    &end.with_timezone(&Utc),
                )
            })
            .map_err(|e| StoreError::database(StoreOperation::Query, e))?;

        vitals
            .into_iter()
            .map(|vital| {
                let timestamp = parse_timestamp(&vital.timestamp)
                    .ok_or(StoreError::MalformedEntry { id: vital.id })?;
                Ok(StoredPressure {
                    timestamp,
                    systolic: vital.value1 as i32,
                    diastolic: vital.value2.unwrap_or(0.0) as i32,
                })
            })
            .collect()
    }
}
