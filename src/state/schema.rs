//! Database schema definitions and migrations.

use rusqlite::Connection;

use super::error::StateError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Schema DDL for version 1.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS liked_videos (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    published_at INTEGER NOT NULL,
    channel_title TEXT NOT NULL DEFAULT '',
    thumbnail_url TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '',
    category_id TEXT NOT NULL DEFAULT '',
    video_url TEXT NOT NULL,
    duration TEXT NOT NULL DEFAULT '',
    synced_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_liked_videos_published_at ON liked_videos(published_at);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    pages_fetched INTEGER DEFAULT 0,
    records_fetched INTEGER DEFAULT 0,
    records_stored INTEGER DEFAULT 0,
    status TEXT,
    error TEXT
);
"#;

/// Get the current schema version from the database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StateError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StateError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the database schema.
///
/// Idempotent; safe to call on both new and existing databases.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StateError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StateError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version < SCHEMA_VERSION {
        for version in (current_version + 1)..=SCHEMA_VERSION {
            migrate_to_version(conn, version)?;
        }
    }

    Ok(())
}

fn migrate_to_version(conn: &Connection, version: i32) -> Result<(), StateError> {
    match version {
        1 => conn.execute_batch(SCHEMA_V1)?,
        other => {
            return Err(StateError::UnsupportedSchemaVersion {
                found: other,
                expected: SCHEMA_VERSION,
            })
        }
    }
    set_schema_version(conn, version)?;
    tracing::debug!("Migrated database to schema version {}", version);
    Ok(())
}
