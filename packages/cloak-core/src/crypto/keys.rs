//! # Node Identities
//!
//! Every participant is identified by an X25519 public key. The private half
//! lives only inside a [`KeyStore`](crate::keystore::KeyStore) and is handed
//! to the enclave for the duration of a single seal/unseal.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          IDENTITY LAYOUT                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  PrivateKey (StaticSecret, zeroized on drop)                           │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  PublicKey (32 bytes)                                                  │
//! │    • base64 in JSON, config and key files                              │
//! │    • raw bytes in CBOR                                                 │
//! │    • ordered by raw bytes (used for LEGACY group ids)                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::ZeroizeOnDrop;

use crate::encoding;
use crate::error::{Error, Result};

/// Size of a public or private key in bytes
pub const KEY_LENGTH: usize = 32;

/// A participant's public identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(#[serde(with = "encoding::bytes32")] [u8; KEY_LENGTH]);

impl PublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Encode as standard base64
    pub fn to_base64(&self) -> String {
        encoding::to_base64(&self.0)
    }

    /// Decode from standard base64
    pub fn from_base64(s: &str) -> Result<Self> {
        encoding::from_base64_32(s)
            .map(Self)
            .map_err(|e| Error::InvalidKey(format!("public key: {}", e)))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base64(s)
    }
}

/// An X25519 private key
///
/// Zeroized on drop by `x25519-dalek`. `Debug` never prints key material.
#[derive(Clone, ZeroizeOnDrop)]
pub struct PrivateKey {
    #[zeroize(skip)] // x25519_dalek handles its own zeroization
    secret: StaticSecret,
}

impl PrivateKey {
    /// Generate a new random private key from the OS CSPRNG
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(OsRng),
        }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    /// Get the secret key bytes
    ///
    /// Only for writing key files. Never log these bytes.
    pub fn to_bytes(&self) -> [u8; KEY_LENGTH] {
        self.secret.to_bytes()
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey(X25519PublicKey::from(&self.secret).to_bytes())
    }

    /// X25519 Diffie-Hellman with another participant's public key
    ///
    /// `a.diffie_hellman(B) == b.diffie_hellman(A)`
    ///
    /// Fails with `InvalidKey` for low-order public keys, whose shared
    /// secret is known to everyone.
    pub fn diffie_hellman(&self, their_public: &PublicKey) -> Result<[u8; 32]> {
        let point = X25519PublicKey::from(*their_public.as_bytes());
        let shared = self.secret.diffie_hellman(&point);
        if !shared.was_contributory() {
            return Err(Error::InvalidKey(format!(
                "{} is a low-order point",
                their_public
            )));
        }
        Ok(shared.to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(for {})", self.public_key())
    }
}

/// A public/private key pair
#[derive(Clone, Debug)]
pub struct KeyPair {
    /// Public half
    pub public: PublicKey,
    /// Private half
    pub private: PrivateKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_private(PrivateKey::generate())
    }

    /// Build a pair from an existing private key
    pub fn from_private(private: PrivateKey) -> Self {
        Self {
            public: private.public_key(),
            private,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
