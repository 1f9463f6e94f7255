//! # Storage Module
//!
//! Persistent state of a node.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE LAYERS                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐           │
//! │  │ EncryptedPayloadStorage  │   │  PrivacyGroupStorage     │  domain   │
//! │  │ key = digest(ciphertext) │   │  key = privacy group id  │           │
//! │  └────────────┬─────────────┘   └─────┬──────────────┬─────┘           │
//! │               │                       │              │                  │
//! │               ▼                       ▼              ▼                  │
//! │  ┌───────────────────┐   ┌───────────────────┐  ┌──────────────┐       │
//! │  │ ns "payload"      │   │ ns "privacygroup" │  │ ns "groupidx"│       │
//! │  └─────────┬─────────┘   └─────────┬─────────┘  └──────┬───────┘       │
//! │            └───────────────────────┼───────────────────┘               │
//! │                                    ▼                                    │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  StorageEngine: get / put / delete over raw bytes               │   │
//! │  │  MemoryStorage (DashMap)  |  SqliteStorage (rusqlite)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod groups;
mod memory;
mod payloads;
mod sqlite;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub use groups::PrivacyGroupStorage;
pub use memory::MemoryStorage;
pub use payloads::EncryptedPayloadStorage;
pub use sqlite::{SqliteDatabase, SqliteStorage};

use crate::error::{Error, Result};

/// Namespace holding sealed bundles
pub const PAYLOAD_NAMESPACE: &str = "payload";
/// Namespace holding privacy group definitions
pub const PRIVACY_GROUP_NAMESPACE: &str = "privacygroup";
/// Namespace mapping member sets to privacy group ids
pub const GROUP_INDEX_NAMESPACE: &str = "groupidx";

/// Key/value capability with no knowledge of what it stores
///
/// `put` followed by `get` on the same key is immediately consistent.
pub trait StorageEngine: Send + Sync {
    /// Value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert or replace the value under `key`
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Whether `key` is present
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Which backend to open, parsed from `"memory"` or `"sqlite:<path>"`
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum StorageConfig {
    /// Volatile, for tests and throwaway nodes
    #[default]
    Memory,
    /// SQLite database file
    Sqlite(PathBuf),
}

impl FromStr for StorageConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            None if s == "memory" => Ok(StorageConfig::Memory),
            Some(("sqlite", path)) if !path.is_empty() => {
                Ok(StorageConfig::Sqlite(PathBuf::from(path)))
            }
            _ => Err(Error::Validation(format!(
                "unknown storage '{}', expected 'memory' or 'sqlite:<path>'",
                s
            ))),
        }
    }
}

impl fmt::Display for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageConfig::Memory => f.write_str("memory"),
            StorageConfig::Sqlite(path) => write!(f, "sqlite:{}", path.display()),
        }
    }
}

/// An opened backend that hands out one engine per namespace
#[derive(Clone)]
pub enum StorageBackend {
    /// Each namespace is its own map
    Memory,
    /// All namespaces share one database
    Sqlite(SqliteDatabase),
}

impl StorageBackend {
    /// Open the backend described by `config`
    pub fn open(config: &StorageConfig) -> Result<Self> {
        match config {
            StorageConfig::Memory => Ok(StorageBackend::Memory),
            StorageConfig::Sqlite(path) => {
                let db = SqliteDatabase::open(Some(path.as_path()))?;
                Ok(StorageBackend::Sqlite(db))
            }
        }
    }

    /// Engine scoped to `name`
    pub fn namespace(&self, name: &str) -> Arc<dyn StorageEngine> {
        match self {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Sqlite(db) => Arc::new(db.namespace(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage_config() {
        assert_eq!("memory".parse::<StorageConfig>().unwrap(), StorageConfig::Memory);
        assert_eq!(
            "sqlite:/var/lib/cloak/node.db".parse::<StorageConfig>().unwrap(),
            StorageConfig::Sqlite(PathBuf::from("/var/lib/cloak/node.db"))
        );
        assert!("leveldb:/tmp/x".parse::<StorageConfig>().is_err());
        assert!("sqlite:".parse::<StorageConfig>().is_err());
    }

    #[test]
    fn test_storage_config_display_round_trips() {
        let config = StorageConfig::Sqlite(PathBuf::from("data/node.db"));
        assert_eq!(config.to_string().parse::<StorageConfig>().unwrap(), config);
    }

    #[test]
    fn test_memory_namespaces_are_isolated() {
        let backend = StorageBackend::open(&StorageConfig::Memory).unwrap();
        let a = backend.namespace("a");
        let b = backend.namespace("b");

        a.put(b"k", b"v").unwrap();
        assert!(b.get(b"k").unwrap().is_none());
    }
}
