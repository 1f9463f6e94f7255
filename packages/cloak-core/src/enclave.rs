//! # Enclave
//!
//! The cryptographic boundary of a node. It seals plaintext for a set of
//! recipients, unseals bundles for one local identity, and derives privacy
//! group ids. It holds no state besides a handle to the key store.
//!
//! ## Privacy Group Ids
//!
//! ```text
//! LEGACY    SHA-256( sort(dedup(members)) concatenated )
//!           any participant recomputes it from a recipient list
//!
//! PANTHEON  SHA-256( seed || members as given )
//!           explicitly created groups; the seed tells apart groups
//!           with identical membership
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::crypto::{self, hash, EncryptionKey, Nonce, PublicKey};
use crate::error::{Error, Result};
use crate::keystore::KeyStore;
use crate::payload::{EncryptedKey, EncryptedPayload, PrivacyGroupId, PrivacyGroupType};

/// Seals and unseals payloads using keys from a [`KeyStore`]
#[derive(Clone)]
pub struct Enclave {
    keystore: Arc<dyn KeyStore>,
}

impl Enclave {
    /// Create an enclave over `keystore`
    pub fn new(keystore: Arc<dyn KeyStore>) -> Self {
        Self { keystore }
    }

    /// Identities this node can seal and unseal for
    pub fn node_keys(&self) -> Vec<PublicKey> {
        self.keystore.node_keys()
    }

    /// Whether this node holds the private key for `key`
    pub fn is_node_key(&self, key: &PublicKey) -> bool {
        self.keystore.is_node_key(key)
    }

    /// Access the underlying key store
    pub fn keystore(&self) -> &Arc<dyn KeyStore> {
        &self.keystore
    }

    /// Seal `plaintext` from `sender` for `recipients`.
    ///
    /// The sender always receives a key entry of its own so it can read back
    /// what it sent. Duplicate recipients get a single entry.
    ///
    /// Fails with `EncryptionFailed` if the sender's private key is not held
    /// by this node or a recipient key is a low-order point.
    pub fn seal(
        &self,
        plaintext: &[u8],
        sender: &PublicKey,
        recipients: &[PublicKey],
        privacy_group_id: Option<PrivacyGroupId>,
    ) -> Result<EncryptedPayload> {
        let sender_key = self.keystore.private_key(sender).map_err(|e| match e {
            Error::KeyNotFound(k) => {
                Error::EncryptionFailed(format!("no private key for sender {}", k))
            }
            other => other,
        })?;

        let payload_key = EncryptionKey::random();
        let (nonce, cipher_text) = crypto::encrypt(&payload_key, plaintext, &[])?;

        let mut unique = Vec::with_capacity(recipients.len() + 1);
        for key in std::iter::once(sender).chain(recipients.iter()) {
            if !unique.contains(key) {
                unique.push(*key);
            }
        }

        let combined_key_nonce = Nonce::random();
        let encrypted_keys = unique
            .iter()
            .map(|recipient| {
                let wrap_key = crypto::derive_wrap_key(&sender_key, recipient).map_err(|e| {
                    Error::EncryptionFailed(format!("cannot wrap key for {}: {}", recipient, e))
                })?;
                let encrypted_key = crypto::encrypt_with_nonce(
                    &wrap_key,
                    &combined_key_nonce,
                    payload_key.as_bytes(),
                    &wrap_aad(sender, recipient),
                )?;
                Ok(EncryptedKey {
                    recipient: *recipient,
                    encrypted_key,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EncryptedPayload {
            sender: *sender,
            nonce,
            cipher_text,
            combined_key_nonce,
            encrypted_keys,
            recipients: Some(unique),
            privacy_group_id,
        })
    }

    /// Unseal `payload` as `identity`.
    ///
    /// Fails with `DecryptionFailed` if this node lacks the identity's key,
    /// the bundle has no entry for it, or any authentication check fails.
    pub fn unseal(&self, payload: &EncryptedPayload, identity: &PublicKey) -> Result<Vec<u8>> {
        let private = self.keystore.private_key(identity).map_err(|e| match e {
            Error::KeyNotFound(k) => {
                Error::DecryptionFailed(format!("no private key for recipient {}", k))
            }
            other => other,
        })?;

        let entry = payload.encrypted_key_for(identity).ok_or_else(|| {
            Error::DecryptionFailed(format!("payload is not addressed to {}", identity))
        })?;

        let wrap_key = crypto::derive_wrap_key(&private, &payload.sender).map_err(|e| {
            Error::DecryptionFailed(format!("cannot unwrap key from {}: {}", payload.sender, e))
        })?;
        let payload_key_bytes = crypto::decrypt(
            &wrap_key,
            &payload.combined_key_nonce,
            &entry.encrypted_key,
            &wrap_aad(&payload.sender, identity),
        )?;
        let payload_key = EncryptionKey::from_slice(&payload_key_bytes)?;

        crypto::decrypt(&payload_key, &payload.nonce, &payload.cipher_text, &[])
    }

    /// Derive a privacy group id. Pure; needs no key material.
    pub fn generate_privacy_group_id(
        members: &[PublicKey],
        seed: Option<&[u8]>,
        kind: PrivacyGroupType,
    ) -> PrivacyGroupId {
        let digest = match kind {
            PrivacyGroupType::Legacy => {
                let sorted: BTreeSet<&PublicKey> = members.iter().collect();
                hash::sha256_concat(sorted.into_iter().map(|k| k.as_bytes().as_slice()))
            }
            PrivacyGroupType::Pantheon => hash::sha256_concat(
                std::iter::once(seed.unwrap_or_default())
                    .chain(members.iter().map(|k| k.as_bytes().as_slice())),
            ),
        };
        PrivacyGroupId::from_bytes(digest)
    }
}

/// AAD binding a wrapped key to its sender and recipient
fn wrap_aad(sender: &PublicKey, recipient: &PublicKey) -> [u8; 64] {
    let mut aad = [0u8; 64];
    aad[..32].copy_from_slice(sender.as_bytes());
    aad[32..].copy_from_slice(recipient.as_bytes());
    aad
}

// ============================================================================
// TESTS
// ============================================================================
