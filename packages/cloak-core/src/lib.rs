//! # Cloak Core
//!
//! Building blocks of a Cloak privacy node: a node accepts a plaintext from
//! a local client, encrypts it for a set of recipients, stores the ciphertext
//! under its digest, and pushes it to the nodes that host those recipients.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          CLOAK CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │                        ┌──────────────────────┐                         │
//! │   client API  ───────► │         Node         │ ◄─────── peer API       │
//! │   (JSON)               │ send / receive / push│          (CBOR)         │
//! │                        │ privacy group flows  │                         │
//! │                        └───┬──────┬───────┬───┘                         │
//! │                            │      │       │                             │
//! │   ┌────────────────┐  ┌────▼──┐ ┌─▼─────┐ ┌▼────────────────────────┐  │
//! │   │   KeyStore     │◄─┤Enclave│ │Storage│ │        Network          │  │
//! │   │ - file / memory│  │ seal  │ │payload│ │ - key -> URL registry   │  │
//! │   └────────────────┘  │ unseal│ │groups │ │ - peer client (HTTP)    │  │
//! │                       │ ids   │ │sqlite │ │ - party-info discovery  │  │
//! │                       └───────┘ └───────┘ └─────────────────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error type and codes for the whole library
//! - [`crypto`] - X25519 keys, AES-256-GCM, key wrapping, digests
//! - [`keystore`] - Node key material (files or memory)
//! - [`enclave`] - Seal/unseal payloads, derive privacy group ids
//! - [`storage`] - Key/value engines and the payload/group stores on top
//! - [`network`] - Peer registry, peer client, discovery
//! - [`node`] - Orchestration of every client and peer operation
//! - [`api`] - Client JSON bodies and their validation
//! - [`operation`] - The HTTP operations a node serves
//!
//! ## Encodings
//!
//! | Surface | Format | Binary fields |
//! |---------|--------|---------------|
//! | Client API | JSON | base64 strings |
//! | Peer API | CBOR | byte strings |
//! | Storage | CBOR | byte strings |

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod crypto;
pub mod enclave;
pub mod encoding;
pub mod error;
pub mod keystore;
pub mod network;
pub mod node;
pub mod operation;
pub mod payload;
pub mod storage;

#[cfg(test)]
mod testkit;

pub use enclave::Enclave;
pub use error::{Error, PropagationFailure, Result};
pub use node::{CreatePrivacyGroupParams, Node, Received, SendParams};
pub use operation::{ApiSide, Method, Operation};
pub use payload::{
    EncryptedPayload, PrivacyGroup, PrivacyGroupId, PrivacyGroupPayload, PrivacyGroupState,
    PrivacyGroupType, StorageKey,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
