//! Node configuration.
//!
//! Loaded from an optional TOML file. Every field has a default, so an
//! empty file (or no file at all) yields a throwaway in-memory node on
//! `127.0.0.1:8080` / `127.0.0.1:8888`.
//!
//! ```toml
//! node_port = 8080
//! client_port = 8888
//! other_nodes = ["http://10.0.0.2:8080"]
//! public_keys = ["keys/node.pub"]
//! private_keys = ["keys/node.key"]
//! work_dir = "/var/lib/cloak"
//! storage = "sqlite:cloak.db"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cloak_core::storage::StorageConfig;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`NodeConfig`]
    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Underlying TOML error
        source: toml::de::Error,
    },

    /// `public_keys` and `private_keys` must pair up
    #[error("{public} public key(s) but {private} private key(s) configured")]
    KeyCountMismatch {
        /// Number of public key paths
        public: usize,
        /// Number of private key paths
        private: usize,
    },

    /// A value was rejected by the core library
    #[error(transparent)]
    Core(#[from] cloak_core::Error),
}

/// TOML configuration of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// URL peers reach this node at; derived from interface and port when unset
    pub node_url: Option<String>,
    /// Peer API port
    pub node_port: u16,
    /// Peer API bind address
    pub node_network_interface: String,
    /// URL local clients reach this node at; derived when unset
    pub client_url: Option<String>,
    /// Client API port
    pub client_port: u16,
    /// Client API bind address
    pub client_network_interface: String,
    /// Seed peers contacted by discovery
    pub other_nodes: Vec<String>,
    /// Public key files, paired by position with `private_keys`
    pub public_keys: Vec<PathBuf>,
    /// Private key files
    pub private_keys: Vec<PathBuf>,
    /// Base for every relative path in this file
    pub work_dir: PathBuf,
    /// `"memory"` or `"sqlite:<path>"`
    pub storage: String,
    /// Seconds between party-info exchanges with each peer
    pub discovery_interval_secs: u64,
    /// Seconds before an outbound peer call is abandoned
    pub peer_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_url: None,
            node_port: 8080,
            node_network_interface: "127.0.0.1".to_string(),
            client_url: None,
            client_port: 8888,
            client_network_interface: "127.0.0.1".to_string(),
            other_nodes: Vec::new(),
            public_keys: Vec::new(),
            private_keys: Vec::new(),
            work_dir: PathBuf::from("."),
            storage: "memory".to_string(),
            discovery_interval_secs: 30,
            peer_timeout_secs: 10,
        }
    }
}

impl NodeConfig {
    /// Read and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.public_keys.len() != self.private_keys.len() {
            return Err(ConfigError::KeyCountMismatch {
                public: self.public_keys.len(),
                private: self.private_keys.len(),
            });
        }
        self.storage_config()?;
        Ok(())
    }

    /// URL advertised to peers
    pub fn node_url(&self) -> String {
        self.node_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.node_network_interface, self.node_port))
    }

    /// URL advertised to local clients
    pub fn client_url(&self) -> String {
        self.client_url.clone().unwrap_or_else(|| {
            format!("http://{}:{}", self.client_network_interface, self.client_port)
        })
    }

    /// Peer API bind address
    pub fn node_bind_addr(&self) -> String {
        format!("{}:{}", self.node_network_interface, self.node_port)
    }

    /// Client API bind address
    pub fn client_bind_addr(&self) -> String {
        format!("{}:{}", self.client_network_interface, self.client_port)
    }

    /// `(public, private)` key file pairs resolved against `work_dir`
    pub fn key_pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        self.public_keys
            .iter()
            .zip(&self.private_keys)
            .map(|(public, private)| (self.resolve(public), self.resolve(private)))
            .collect()
    }

    /// Storage backend with any SQLite path resolved against `work_dir`
    pub fn storage_config(&self) -> Result<StorageConfig, ConfigError> {
        let config = match self.storage.parse::<StorageConfig>()? {
            StorageConfig::Sqlite(path) => StorageConfig::Sqlite(self.resolve(&path)),
            StorageConfig::Memory => StorageConfig::Memory,
        };
        Ok(config)
    }

    /// Interval between party-info exchanges
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs.max(1))
    }

    /// Timeout of outbound peer calls
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs.max(1))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }
}
