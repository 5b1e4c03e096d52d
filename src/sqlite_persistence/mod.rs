mod versioned_schema;

pub use versioned_schema::*;

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

/// Offset added to schema versions before writing `PRAGMA user_version`,
/// so a foreign SQLite file is never mistaken for one of ours.
pub const BASE_DB_VERSION: usize = 41000;

/// Opens (or creates) a database and brings it to the latest schema in `schemas`.
///
/// A fresh file gets the latest schema directly. An existing file is validated
/// against the schema matching its recorded version, then migrated forward.
pub fn open_versioned_db<P: AsRef<Path>>(
    db_path: P,
    schemas: &[VersionedSchema],
    label: &str,
) -> Result<Connection> {
    let path = db_path.as_ref();
    let is_new_db = !path.exists();
    let latest = schemas
        .last()
        .ok_or_else(|| anyhow!("No schema defined for {} database", label))?;

    let mut conn =
        Connection::open(path).with_context(|| format!("Failed to open {} database", label))?;
    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    if is_new_db {
        info!("Creating new {} database at {:?}", label, path);
        latest.create(&conn)?;
        return Ok(conn);
    }

    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let db_version = raw_version - BASE_DB_VERSION as i64;
    if db_version < 1 {
        anyhow::bail!(
            "{} database version {} is invalid (expected >= 1)",
            label,
            db_version
        );
    }
    let db_version = db_version as usize;

    schemas
        .iter()
        .find(|s| s.version == db_version)
        .with_context(|| format!("Unknown {} database version {}", label, db_version))?
        .validate(&conn)
        .with_context(|| {
            format!(
                "{} database schema validation failed for version {}",
                label, db_version
            )
        })?;

    if db_version < latest.version {
        info!(
            "Migrating {} database from version {} to {}",
            label, db_version, latest.version
        );
        let tx = conn.transaction()?;
        for schema in schemas.iter().filter(|s| s.version > db_version) {
            if let Some(migration) = schema.migration {
                migration(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest.version),
            [],
        )?;
        tx.commit()?;
    }

    Ok(conn)
}

/// Runs a blocking store call on the blocking thread pool.
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("Blocking store task failed: {}", e))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_column;
    use tempfile::TempDir;

    const NOTES_V1: Table = Table {
        name: "notes",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("body", &SqlType::Text, non_null = true),
        ],
        indices: &[],
        unique_constraints: &[],
    };

    const NOTES_V2: Table = Table {
        name: "notes",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("body", &SqlType::Text, non_null = true),
            sqlite_column!("pinned", &SqlType::Integer, non_null = true, default_value = Some("0")),
        ],
        indices: &[("idx_notes_pinned", "pinned")],
        unique_constraints: &[],
    };

    fn add_pinned(conn: &Connection) -> Result<()> {
        conn.execute(
            "ALTER TABLE notes ADD COLUMN pinned INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
        conn.execute("CREATE INDEX idx_notes_pinned ON notes(pinned)", [])?;
        Ok(())
    }

    #[test]
    fn creates_then_migrates_forward() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.db");

        let v1 = [VersionedSchema {
            version: 1,
            tables: &[NOTES_V1],
            migration: None,
        }];
        let conn = open_versioned_db(&path, &v1, "notes").unwrap();
        conn.execute("INSERT INTO notes (body) VALUES ('hello')", [])
            .unwrap();
        drop(conn);

        let v2 = [
            VersionedSchema {
                version: 1,
                tables: &[NOTES_V1],
                migration: None,
            },
            VersionedSchema {
                version: 2,
                tables: &[NOTES_V2],
                migration: Some(add_pinned),
            },
        ];
        let conn = open_versioned_db(&path, &v2, "notes").unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION + 2);
        v2[1].validate(&conn).unwrap();

        let body: String = conn
            .query_row("SELECT body FROM notes WHERE pinned = 0", [], |r| r.get(0))
            .unwrap();
        assert_eq!(body, "hello");
    }

    #[test]
    fn rejects_foreign_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.db");
        Connection::open(&path)
            .unwrap()
            .execute("CREATE TABLE x (a TEXT)", [])
            .unwrap();

        let schemas = [VersionedSchema {
            version: 1,
            tables: &[NOTES_V1],
            migration: None,
        }];
        assert!(open_versioned_db(&path, &schemas, "notes").is_err());
    }
}
