//! # SQLite Backend
//!
//! One database file, one `kv` table, every namespace a column value.
//!
//! ```text
//! schema_version (version)
//! kv (namespace TEXT, key BLOB, value BLOB, PRIMARY KEY (namespace, key))
//! ```

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::StorageEngine;
use crate::error::{Error, Result};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS kv (
    namespace TEXT NOT NULL,
    key BLOB NOT NULL,
    value BLOB NOT NULL,
    PRIMARY KEY (namespace, key)
) WITHOUT ROWID;
"#;

/// Shared SQLite connection
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let conn = match path {
            Some(p) => {
                if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(p)
                    .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?
            }
            None => Connection::open_in_memory().map_err(|e| {
                Error::Storage(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| Error::Storage(format!("Failed to create tables: {}", e)))?;

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match version {
            None => {
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![SCHEMA_VERSION],
                )?;
                tracing::info!("Database schema created (version {})", SCHEMA_VERSION);
            }
            Some(v) if v > SCHEMA_VERSION => {
                return Err(Error::Storage(format!(
                    "Database schema version {} is newer than supported {}",
                    v, SCHEMA_VERSION
                )));
            }
            Some(v) => {
                tracing::debug!("Database schema is at version {}", v);
            }
        }

        Ok(())
    }

    /// Engine scoped to `namespace`
    pub fn namespace(&self, namespace: &str) -> SqliteStorage {
        SqliteStorage {
            conn: Arc::clone(&self.conn),
            namespace: namespace.to_string(),
        }
    }
}

/// One namespace of a [`SqliteDatabase`]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
}

impl StorageEngine for SqliteStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE namespace = ? AND key = ?",
                params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO kv (namespace, key, value) VALUES (?, ?, ?)",
            params![self.namespace, key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM kv WHERE namespace = ? AND key = ?",
            params![self.namespace, key],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_creation() {
        let db = SqliteDatabase::open(None).unwrap();
        let store = db.namespace("payload");
        assert!(store.get(b"missing").unwrap().is_none());
    }

    #[test]
    fn test_namespaces_share_file_but_not_keys() {
        let db = SqliteDatabase::open(None).unwrap();
        let payloads = db.namespace("payload");
        let groups = db.namespace("privacygroup");

        payloads.put(b"k", b"bundle").unwrap();
        groups.put(b"k", b"group").unwrap();

        assert_eq!(payloads.get(b"k").unwrap(), Some(b"bundle".to_vec()));
        assert_eq!(groups.get(b"k").unwrap(), Some(b"group".to_vec()));

        payloads.delete(b"k").unwrap();
        assert!(payloads.get(b"k").unwrap().is_none());
        assert!(groups.contains(b"k").unwrap());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("node.db");

        {
            let db = SqliteDatabase::open(Some(&path)).unwrap();
            db.namespace("payload").put(b"k", b"v").unwrap();
        }

        let db = SqliteDatabase::open(Some(&path)).unwrap();
        assert_eq!(db.namespace("payload").get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
