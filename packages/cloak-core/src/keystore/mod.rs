//! # Key Store
//!
//! Owns the node's key pairs. The enclave asks it for a private key when
//! sealing (sender) or unsealing (recipient); nothing else ever sees private
//! key material.
//!
//! Key material is read-only once loaded, so one store is shared freely
//! across concurrent requests behind an `Arc<dyn KeyStore>`.

mod file;
mod memory;

use std::path::PathBuf;

pub use file::{key_paths, FileKeyStore, PrivateKeyData, PrivateKeyFile};
pub use memory::MemoryKeyStore;

use crate::crypto::{PrivateKey, PublicKey};
use crate::error::Result;

/// Where and how to write a generated key pair
#[derive(Clone, Debug, Default)]
pub struct KeyConfig {
    /// Path prefix; `<base>.pub` and `<base>.key` are written. `None`
    /// keeps the pair in memory only.
    pub base_path: Option<PathBuf>,
}

impl KeyConfig {
    /// Persist under `base_path`
    pub fn at(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: Some(base_path.into()),
        }
    }
}

/// Capability interface over the node's key material
pub trait KeyStore: Send + Sync {
    /// Private key for `public_key`, or `KeyNotFound`
    fn private_key(&self, public_key: &PublicKey) -> Result<PrivateKey>;

    /// Identities this node can decrypt for, in configuration order.
    /// The first entry is the node's default identity.
    fn node_keys(&self) -> Vec<PublicKey>;

    /// Generate a new pair, persist it per `config`, and add it to the store
    fn generate_key_pair(&self, config: &KeyConfig) -> Result<PublicKey>;

    /// Whether this node holds the private key for `public_key`
    fn is_node_key(&self, public_key: &PublicKey) -> bool {
        self.node_keys().contains(public_key)
    }
}
