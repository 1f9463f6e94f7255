use std::sync::Arc;

use super::StorageEngine;
use crate::error::{Error, Result};
use crate::payload::{EncryptedPayload, StorageKey};

/// Content-addressed store of sealed bundles
#[derive(Clone)]
pub struct EncryptedPayloadStorage {
    engine: Arc<dyn StorageEngine>,
}

impl EncryptedPayloadStorage {
    /// Wrap an engine dedicated to payloads
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    /// Store `payload` under its content digest.
    ///
    /// Storing content that is already present writes nothing and returns
    /// the same key.
    pub fn store(&self, payload: &EncryptedPayload) -> Result<StorageKey> {
        let key = payload.storage_key();
        if self.engine.contains(key.as_bytes())? {
            tracing::debug!(key = %key, "Payload already stored");
            return Ok(key);
        }
        self.engine.put(key.as_bytes(), &payload.to_cbor()?)?;
        Ok(key)
    }

    /// Store a payload pushed under `key` by a peer.
    ///
    /// The digest is recomputed; a mismatch is `CorruptPush` and nothing is
    /// written.
    pub fn store_verified(&self, key: &StorageKey, payload: &EncryptedPayload) -> Result<()> {
        let actual = payload.storage_key();
        if &actual != key {
            tracing::warn!(claimed = %key, actual = %actual, "Rejected pushed payload");
            return Err(Error::CorruptPush {
                key: key.to_base64(),
            });
        }
        self.store(payload).map(|_| ())
    }

    /// Fetch a payload, `NotFound` if absent
    pub fn retrieve(&self, key: &StorageKey) -> Result<EncryptedPayload> {
        match self.engine.get(key.as_bytes())? {
            Some(bytes) => EncryptedPayload::from_cbor(&bytes),
            None => Err(Error::NotFound(format!("payload {}", key))),
        }
    }

    /// Remove a payload
    pub fn delete(&self, key: &StorageKey) -> Result<()> {
        self.engine.delete(key.as_bytes())
    }
}
