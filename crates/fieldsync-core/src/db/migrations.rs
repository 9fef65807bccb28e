//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Reference data, replaced wholesale on download
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            client TEXT,
            status INTEGER NOT NULL DEFAULT 0,
            date_updated TEXT
        );
        CREATE TABLE IF NOT EXISTS work_types (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            status INTEGER NOT NULL DEFAULT 0
        );

        -- User-owned records; a synced row always carries its server id
        CREATE TABLE IF NOT EXISTS time_entries (
            local_id TEXT PRIMARY KEY,
            server_id INTEGER UNIQUE,
            project_id INTEGER NOT NULL,
            work_type_id INTEGER NOT NULL,
            report_date TEXT NOT NULL,
            datetime_from TEXT,
            datetime_to TEXT,
            hours REAL NOT NULL,
            description TEXT,
            sync_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (sync_status IN ('pending', 'synced', 'failed')),
            sync_attempts INTEGER NOT NULL DEFAULT 0,
            sync_error TEXT,
            last_modified TEXT,
            created_at INTEGER NOT NULL,
            CHECK (sync_status <> 'synced' OR server_id IS NOT NULL)
        );
        CREATE INDEX IF NOT EXISTS idx_time_entries_status ON time_entries(sync_status);
        CREATE INDEX IF NOT EXISTS idx_time_entries_date ON time_entries(report_date DESC);

        CREATE TABLE IF NOT EXISTS project_notes (
            local_id TEXT PRIMARY KEY,
            server_id INTEGER UNIQUE,
            project_id INTEGER,
            note_type TEXT NOT NULL,
            note_group TEXT,
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            transcription TEXT,
            is_important INTEGER NOT NULL DEFAULT 0,
            tags TEXT NOT NULL DEFAULT '[]',
            local_file_path TEXT,
            mime_type TEXT,
            server_url TEXT,
            sync_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (sync_status IN ('pending', 'synced', 'failed')),
            sync_attempts INTEGER NOT NULL DEFAULT 0,
            sync_error TEXT,
            last_modified TEXT,
            created_at INTEGER NOT NULL,
            CHECK (sync_status <> 'synced' OR server_id IS NOT NULL)
        );
        CREATE INDEX IF NOT EXISTS idx_project_notes_status ON project_notes(sync_status);

        -- Process-wide scalar state (timestamps, mode, guard mirrors)
        CREATE TABLE IF NOT EXISTS sync_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    tx.commit()?;
    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: per-row local edit counter
fn migrate_v2(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "
        ALTER TABLE time_entries ADD COLUMN revision INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE project_notes ADD COLUMN revision INTEGER NOT NULL DEFAULT 0;

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;

    tx.commit()?;
    tracing::info!("Migrated database to version 2");
    Ok(())
}
