//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Migration v1: health store vitals and the key-value table backing import history
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- VITAL GROUPS
        -- One group per imported reading, linking BP and HR
        -- ============================================
        CREATE TABLE vital_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT,
            timestamp TEXT NOT NULL,             -- UTC: "2025-07-28T08:15:00Z"
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_vital_groups_timestamp ON vital_groups(timestamp);

        -- ============================================
        -- VITALS
        -- blood_pressure: value1 = systolic, value2 = diastolic
        -- heart_rate: value1 = bpm, value2 = null
        -- ============================================
        CREATE TABLE vitals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vital_type TEXT NOT NULL CHECK(vital_type IN ('blood_pressure', 'heart_rate')),
            timestamp TEXT NOT NULL,
            value1 REAL NOT NULL,
            value2 REAL,
            unit TEXT NOT NULL,                  -- "mmHg", "bpm"
            source TEXT NOT NULL DEFAULT 'Unknown', -- device provenance
            group_id INTEGER REFERENCES vital_groups(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_vitals_type ON vitals(vital_type);
        CREATE INDEX idx_vitals_timestamp ON vitals(timestamp);
        CREATE INDEX idx_vitals_group ON vitals(group_id);

        -- ============================================
        -- KEY VALUE
        -- Small named blobs (import history)
        -- ============================================
        CREATE TABLE key_value (
            key TEXT PRIMARY KEY,
            value BLOB NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}
