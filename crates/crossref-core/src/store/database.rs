//! SQLite-backed partition store.
//!
//! Each public method opens its own connection so that the caller never has
//! to manage connection lifetime.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::errors::{CrossRefError, CrossRefResult};
use crate::store::{schema, PartitionStore};

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

/// Keyed partition data persisted in a SQLite file.
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the store at `db_path`.  The path is expanded
    /// and parent directories are created; the tables are created eagerly.
    pub fn open(db_path: impl AsRef<Path>) -> CrossRefResult<Self> {
        let db_str = db_path.as_ref().to_string_lossy();
        let expanded = expand_tilde(&db_str);
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(&expanded)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self { db_path: resolved };
        let conn = store.connect()?;
        schema::initialize(&conn)?;
        debug!("Opened partition store at {}", store.db_path.display());
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> CrossRefResult<Connection> {
        Connection::open(&self.db_path).map_err(CrossRefError::from)
    }
}

impl PartitionStore for SqliteStore {
    fn get_raw(&self, partition: &str, key: &str) -> CrossRefResult<Option<String>> {
        let conn = self.connect()?;
        let value = conn
            .query_row(
                "SELECT value FROM partition_data WHERE partition = ?1 AND key = ?2;",
                params![partition, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_raw(&self, partition: &str, key: &str, value: &str) -> CrossRefResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO partition_data(partition, key, value) VALUES(?1, ?2, ?3) \
             ON CONFLICT(partition, key) DO UPDATE SET \
             value = excluded.value, updated_at = CURRENT_TIMESTAMP;",
            params![partition, key, value],
        )?;
        Ok(())
    }

    fn unset(&self, partition: &str, key: &str) -> CrossRefResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM partition_data WHERE partition = ?1 AND key = ?2;",
            params![partition, key],
        )?;
        Ok(())
    }

    fn enumerate_raw(&self, key: &str) -> CrossRefResult<Vec<(String, String)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT partition, value FROM partition_data WHERE key = ?1 ORDER BY partition;",
        )?;
        let rows = stmt.query_map(params![key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
