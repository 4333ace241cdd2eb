//! SQLite layout of the partition store.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::errors::{CrossRefError, CrossRefResult};

/// Layout version written to `store_meta`.
pub const SCHEMA_VERSION: i32 = 1;

pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS partition_data (
        partition TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(partition, key)
    );",
    // enumerate() filters on key across partitions
    "CREATE INDEX IF NOT EXISTS idx_partition_data_key ON partition_data(key, partition);",
];

/// Create the tables if needed and stamp the layout version.
///
/// Fails with [`CrossRefError::Store`] when the file was written by a newer
/// layout this build cannot read.
pub fn initialize(conn: &Connection) -> CrossRefResult<()> {
    for stmt in SCHEMA_STATEMENTS {
        conn.execute_batch(stmt)?;
    }

    match schema_version(conn)? {
        None => {
            conn.execute(
                "INSERT INTO store_meta(key, value) VALUES('schema_version', ?1);",
                params![SCHEMA_VERSION.to_string()],
            )?;
            debug!("Stamped partition store layout v{SCHEMA_VERSION}");
            Ok(())
        }
        Some(found) if found > SCHEMA_VERSION => Err(CrossRefError::Store(format!(
            "store layout v{found} is newer than supported v{SCHEMA_VERSION}"
        ))),
        Some(_) => Ok(()),
    }
}

/// Layout version recorded in `store_meta`, or `None` on a blank database.
pub fn schema_version(conn: &Connection) -> CrossRefResult<Option<i32>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'schema_version';",
            [],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|v| {
        v.parse::<i32>()
            .map_err(|_| CrossRefError::Store(format!("unreadable schema_version '{v}'")))
    })
    .transpose()
}
