//! # Encryption Module
//!
//! AES-256-GCM primitives used to seal payloads.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SEALED BUNDLE LAYOUT                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Step 1: Encrypt the payload once                                      │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  payload_key = random 32 bytes                              │       │
//! │  │  nonce       = random 12 bytes                              │       │
//! │  │  cipher_text = AES-256-GCM(payload_key, nonce, plaintext)   │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 2: Wrap payload_key for every recipient                          │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  shared   = X25519(sender_private, recipient_public)        │       │
//! │  │  wrap_key = HKDF-SHA256(shared, "cloak-payload-key-wrap-v1")│       │
//! │  │  entry    = AES-256-GCM(wrap_key, combined_key_nonce,       │       │
//! │  │                         payload_key,                        │       │
//! │  │                         aad = sender || recipient)          │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Ciphertext size is independent of the number of recipients.          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::encoding;
use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A nonce for AES-GCM encryption
///
/// **Never reuse a nonce with the same key.** Payload keys are fresh per
/// seal, so random nonces are always safe here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NonceRepr", into = "NonceRepr")]
pub struct Nonce(pub [u8; NONCE_SIZE]);

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct NonceRepr(#[serde(with = "encoding::bytes")] Vec<u8>);

impl TryFrom<NonceRepr> for Nonce {
    type Error = String;

    fn try_from(repr: NonceRepr) -> std::result::Result<Self, Self::Error> {
        let len = repr.0.len();
        repr.0
            .try_into()
            .map(Nonce)
            .map_err(|_| format!("nonce must be {} bytes, got {}", NONCE_SIZE, len))
    }
}

impl From<Nonce> for NonceRepr {
    fn from(nonce: Nonce) -> Self {
        NonceRepr(nonce.0.to_vec())
    }
}

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// An AES-256-GCM key
///
/// Zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Generate a fresh random key
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice that must be exactly [`KEY_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::DecryptionFailed(format!("payload key must be {} bytes", KEY_SIZE))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Encrypt with a freshly generated random nonce
///
/// Returns `(nonce, ciphertext_with_tag)`.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8], aad: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::random();
    let ciphertext = encrypt_with_nonce(key, &nonce, plaintext, aad)?;
    Ok((nonce, ciphertext))
}

/// Encrypt with a caller-supplied nonce
///
/// Used for the per-recipient key wraps, which share one nonce because every
/// wrap key is distinct.
pub fn encrypt_with_nonce(
    key: &EncryptionKey,
    nonce: &Nonce,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    cipher
        .encrypt(AesNonce::from_slice(&nonce.0), payload)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))
}

/// Decrypt an AES-256-GCM ciphertext
///
/// ## Errors
///
/// Returns `DecryptionFailed` if the ciphertext or AAD was tampered with, or
/// if the key or nonce is wrong.
pub fn decrypt(
    key: &EncryptionKey,
    nonce: &Nonce,
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(Error::DecryptionFailed("ciphertext shorter than tag".into()));
    }

    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::DecryptionFailed(format!("Invalid key: {}", e)))?;

    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(AesNonce::from_slice(&nonce.0), payload)
        .map_err(|_| {
            Error::DecryptionFailed("Decryption failed: authentication tag mismatch".into())
        })
}

// ============================================================================
// TESTS
// ============================================================================
