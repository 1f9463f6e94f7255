//! # Cryptography Module
//!
//! Primitives used by the [`Enclave`](crate::enclave::Enclave):
//!
//! | Concern | Construction |
//! |---------|--------------|
//! | Identity | X25519 key pairs |
//! | Payload encryption | AES-256-GCM, fresh key and nonce per seal |
//! | Key wrapping | X25519 + HKDF-SHA256 + AES-256-GCM |
//! | Storage keys | SHA-512/256 over the ciphertext |
//! | Privacy group ids | SHA-256 |

mod encryption;
pub mod hash;
mod kdf;
mod keys;

pub use encryption::{
    decrypt, encrypt, encrypt_with_nonce, EncryptionKey, Nonce, KEY_SIZE, NONCE_SIZE, TAG_SIZE,
};
pub use kdf::{derive_wrap_key, domain};
pub use keys::{KeyPair, PrivateKey, PublicKey, KEY_LENGTH};
