//! # Error Handling
//!
//! Error types for every layer of a Cloak node.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── KeyStore Errors                                                   │
//! │  │   ├── KeyNotFound           - No private key for an identity        │
//! │  │   ├── InvalidKey            - Malformed public/private key bytes    │
//! │  │   └── KeyFile               - Unreadable or unsupported key file    │
//! │  │                                                                      │
//! │  ├── Enclave Errors                                                    │
//! │  │   ├── EncryptionFailed      - Sealing a payload failed              │
//! │  │   └── DecryptionFailed      - Unsealing failed (wrong key/tamper)   │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── NotFound              - Payload or privacy group absent       │
//! │  │   ├── Storage               - Backend read/write failure            │
//! │  │   └── CorruptPush           - Pushed digest != recomputed digest    │
//! │  │                                                                      │
//! │  ├── Network Errors (retryable)                                        │
//! │  │   ├── PeerUnreachable       - Timeout / connection failure          │
//! │  │   └── Propagation           - A recipient's node never got a copy   │
//! │  │                                                                      │
//! │  ├── Request Errors                                                    │
//! │  │   └── Validation            - Malformed request, never hits storage │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      ├── Serialization         - Encoding/decoding failure             │
//! │      └── Internal              - Should not happen                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cryptographic and storage errors are never retried silently. Network
//! errors carry the peer URL and the affected recipients so an outer policy
//! can retry exactly what failed.

use std::fmt;

use thiserror::Error;

use crate::crypto::PublicKey;

/// Result type alias for Cloak operations
pub type Result<T> = std::result::Result<T, Error>;

/// One peer node that could not be given a copy during propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationFailure {
    /// Base URL of the peer node
    pub url: String,
    /// Recipients served by that node (empty URL means none was known)
    pub recipients: Vec<PublicKey>,
    /// Why the push did not land
    pub reason: String,
}

impl fmt::Display for PropagationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let recipients: Vec<String> = self.recipients.iter().map(|k| k.to_base64()).collect();
        if self.url.is_empty() {
            write!(f, "[{}] ({})", recipients.join(", "), self.reason)
        } else {
            write!(f, "[{}] at {} ({})", recipients.join(", "), self.url, self.reason)
        }
    }
}

/// Main error type for Cloak
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // KeyStore Errors (100-199)
    // ========================================================================

    /// No private key is held for this identity
    #[error("No key material for identity {0}")]
    KeyNotFound(PublicKey),

    /// Invalid key format or length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Key file could not be read, parsed or written
    #[error("Key file error: {0}")]
    KeyFile(String),

    // ========================================================================
    // Enclave Errors (200-299)
    // ========================================================================

    /// Sealing a payload failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Unsealing a payload failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    // ========================================================================
    // Storage Errors (300-399)
    // ========================================================================

    /// Requested payload or privacy group does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A peer pushed a payload whose digest does not match the supplied key
    #[error("Pushed payload does not match key {key}")]
    CorruptPush {
        /// Key supplied by the pushing peer
        key: String,
    },

    // ========================================================================
    // Network Errors (400-499)
    // ========================================================================

    /// Timeout or connection failure talking to a peer
    #[error("Peer {url} unreachable: {reason}")]
    PeerUnreachable {
        /// Base URL of the peer
        url: String,
        /// Transport-level reason
        reason: String,
    },

    /// At least one required recipient node did not receive its copy
    #[error("Propagation failed for {}", join_failures(.0))]
    Propagation(Vec<PropagationFailure>),

    // ========================================================================
    // Request Errors (500-599)
    // ========================================================================

    /// Malformed request
    #[error("Invalid request: {0}")]
    Validation(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_failures(failures: &[PropagationFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Numeric error code, grouped by category:
    /// - 100-199: KeyStore
    /// - 200-299: Enclave
    /// - 300-399: Storage
    /// - 400-499: Network
    /// - 500-599: Request
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::KeyNotFound(_) => 100,
            Error::InvalidKey(_) => 101,
            Error::KeyFile(_) => 102,

            Error::EncryptionFailed(_) => 200,
            Error::DecryptionFailed(_) => 201,

            Error::NotFound(_) => 300,
            Error::Storage(_) => 301,
            Error::CorruptPush { .. } => 302,

            Error::PeerUnreachable { .. } => 400,
            Error::Propagation(_) => 401,

            Error::Validation(_) => 500,

            Error::Serialization(_) => 900,
            Error::Internal(_) => 901,
        }
    }

    /// Check if this error is recoverable by retrying the same call
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::PeerUnreachable { .. } | Error::Propagation(_))
    }

    /// Check if the caller, not the node, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self.code() / 100, 1 | 2 | 5) || matches!(self, Error::CorruptPush { .. })
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(err: ciborium::de::Error<std::io::Error>) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(err: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::PeerUnreachable {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
