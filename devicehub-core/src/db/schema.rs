//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//!
//! Timestamps are stored as fixed-width RFC 3339 text with microsecond
//! precision (`2025-04-11T02:27:36.718590Z`), so lexical order equals
//! chronological order. Ids are stored as hyphenated lowercase UUID text.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id               TEXT PRIMARY KEY,
        serial_number    TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS users (
        id               TEXT PRIMARY KEY,
        name             TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS measurements (
        id               TEXT PRIMARY KEY,
        device_id        TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
        timestamp        DATETIME NOT NULL,
        x                REAL NOT NULL,
        y                REAL NOT NULL,
        z                REAL NOT NULL
    );

    -- Pure join table; the pair is the identity
    CREATE TABLE IF NOT EXISTS user_device_association (
        user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        device_id        TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, device_id)
    );

    CREATE INDEX IF NOT EXISTS idx_measurements_device ON measurements(device_id);
    CREATE INDEX IF NOT EXISTS idx_measurements_timestamp ON measurements(timestamp);
    CREATE INDEX IF NOT EXISTS idx_measurements_device_ts ON measurements(device_id, timestamp);
    CREATE INDEX IF NOT EXISTS idx_user_device_device ON user_device_association(device_id);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version = get_schema_version(conn)?;

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
