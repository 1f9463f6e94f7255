use parking_lot::RwLock;

use super::{file, KeyConfig, KeyStore};
use crate::crypto::{KeyPair, PrivateKey, PublicKey};
use crate::error::{Error, Result};

/// In-memory key store
///
/// Keys are lost on restart unless `generate_key_pair` is given a path.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: RwLock<Vec<KeyPair>>,
}

impl MemoryKeyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `pairs`, first pair being the default identity
    pub fn with_keys(pairs: impl IntoIterator<Item = KeyPair>) -> Self {
        let store = Self::new();
        for pair in pairs {
            store.add_node_key(pair);
        }
        store
    }

    /// Add a pair. Re-adding a known identity is a no-op.
    pub fn add_node_key(&self, pair: KeyPair) -> PublicKey {
        let public = pair.public;
        let mut keys = self.keys.write();
        if !keys.iter().any(|k| k.public == public) {
            keys.push(pair);
        }
        public
    }
}

impl KeyStore for MemoryKeyStore {
    fn private_key(&self, public_key: &PublicKey) -> Result<PrivateKey> {
        self.keys
            .read()
            .iter()
            .find(|k| &k.public == public_key)
            .map(|k| k.private.clone())
            .ok_or(Error::KeyNotFound(*public_key))
    }

    fn node_keys(&self) -> Vec<PublicKey> {
        self.keys.read().iter().map(|k| k.public).collect()
    }

    fn generate_key_pair(&self, config: &KeyConfig) -> Result<PublicKey> {
        let pair = KeyPair::generate();
        if let Some(base) = &config.base_path {
            file::write_key_pair(base, &pair)?;
        }
        Ok(self.add_node_key(pair))
    }
}
