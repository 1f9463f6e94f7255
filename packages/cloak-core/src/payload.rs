//! # Data Model
//!
//! Sealed bundles, content keys and privacy-group records.
//!
//! ```text
//! EncryptedPayload
//! ├── sender               PublicKey
//! ├── nonce                12 bytes
//! ├── cipher_text          AES-256-GCM(payload_key, plaintext)
//! ├── combined_key_nonce   12 bytes, shared by all key wraps
//! ├── encrypted_keys[]     (recipient, wrapped payload_key)
//! ├── recipients?          every intended recipient
//! └── privacy_group_id?    group the bundle was addressed to
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crypto::{hash, Nonce, PublicKey};
use crate::encoding;
use crate::error::{Error, Result};

macro_rules! digest_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(#[serde(with = "encoding::bytes32")] [u8; 32]);

        impl $name {
            /// Create from raw digest bytes
            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw digest bytes
            pub fn as_bytes(&self) -> &[u8; 32] {
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
                    .map_err(|e| Error::Validation(format!("{}: {}", $what, e)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_base64())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_base64())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_base64(s)
            }
        }
    };
}

digest_id!(
    /// Content-derived key of a sealed bundle (the digest handed to clients)
    StorageKey,
    "storage key"
);

digest_id!(
    /// Deterministic identifier of a privacy group
    PrivacyGroupId,
    "privacy group id"
);

/// A payload key wrapped for one recipient
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKey {
    /// Recipient able to unwrap this entry
    pub recipient: PublicKey,
    /// AES-256-GCM(wrap_key, combined_key_nonce, payload_key)
    #[serde(with = "encoding::bytes")]
    pub encrypted_key: Vec<u8>,
}

/// A sealed bundle. Immutable once created; the unit of storage and push.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    /// Identity that sealed the bundle
    pub sender: PublicKey,
    /// Nonce for `cipher_text`
    pub nonce: Nonce,
    /// Plaintext encrypted once under the payload key
    #[serde(with = "encoding::bytes")]
    pub cipher_text: Vec<u8>,
    /// Nonce shared by every entry of `encrypted_keys`
    pub combined_key_nonce: Nonce,
    /// One wrapped payload key per recipient
    pub encrypted_keys: Vec<EncryptedKey>,
    /// Every intended recipient, kept so group ids can be recomputed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<PublicKey>>,
    /// Privacy group the bundle was sent to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_group_id: Option<PrivacyGroupId>,
}

impl EncryptedPayload {
    /// Content digest used as this bundle's storage key
    pub fn storage_key(&self) -> StorageKey {
        StorageKey(hash::payload_digest(&self.cipher_text))
    }

    /// Wrapped key entry for `recipient`, if any
    pub fn encrypted_key_for(&self, recipient: &PublicKey) -> Option<&EncryptedKey> {
        self.encrypted_keys.iter().find(|k| &k.recipient == recipient)
    }

    /// Recipients holding a key entry, in entry order.
    ///
    /// `None` when the optional `recipients` list names a different set:
    /// that list is not covered by any key entry and cannot be trusted alone.
    pub fn recipient_keys(&self) -> Option<Vec<PublicKey>> {
        let mut keys = Vec::with_capacity(self.encrypted_keys.len());
        for entry in &self.encrypted_keys {
            if !keys.contains(&entry.recipient) {
                keys.push(entry.recipient);
            }
        }
        match &self.recipients {
            Some(listed) => {
                let same = listed.len() >= keys.len()
                    && listed.iter().all(|k| keys.contains(k))
                    && keys.iter().all(|k| listed.contains(k));
                same.then_some(keys)
            }
            None => Some(keys),
        }
    }

    /// Encode for peer traffic and storage
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        encoding::to_cbor(self)
    }

    /// Decode from peer traffic or storage
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        encoding::from_cbor(bytes)
    }
}

/// How a privacy group id was derived
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrivacyGroupType {
    /// Sorted, deduplicated member set; no seed
    Legacy,
    /// Seed plus members as given
    Pantheon,
}

/// Lifecycle state of a privacy group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrivacyGroupState {
    /// Visible to lookups
    Active,
    /// Soft-deleted; behaves as absent for lookups
    Deleted,
}

/// Stored definition of a privacy group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyGroupPayload {
    /// Derivation scheme of the id
    #[serde(rename = "type")]
    pub kind: PrivacyGroupType,
    /// Members in the order the group was created with
    pub members: Vec<PublicKey>,
    /// PANTHEON seed
    #[serde(default, with = "optional_bytes", skip_serializing_if = "Option::is_none")]
    pub seed: Option<Vec<u8>>,
    /// Human-readable name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Lifecycle state
    pub state: PrivacyGroupState,
}

impl PrivacyGroupPayload {
    /// Whether lookups should see this group
    pub fn is_active(&self) -> bool {
        self.state == PrivacyGroupState::Active
    }

    /// Whether `key` is a member
    pub fn has_member(&self, key: &PublicKey) -> bool {
        self.members.contains(key)
    }

    /// Copy of this definition in the DELETED state
    pub fn deleted(&self) -> Self {
        Self {
            state: PrivacyGroupState::Deleted,
            ..self.clone()
        }
    }
}

/// A privacy group as returned to clients
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyGroup {
    /// Group id
    pub privacy_group_id: PrivacyGroupId,
    /// Derivation scheme
    #[serde(rename = "type")]
    pub kind: PrivacyGroupType,
    /// Human-readable name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Member identities
    pub members: Vec<PublicKey>,
}

impl PrivacyGroup {
    /// Client view of a stored definition
    pub fn from_payload(id: PrivacyGroupId, payload: &PrivacyGroupPayload) -> Self {
        Self {
            privacy_group_id: id,
            kind: payload.kind,
            name: payload.name.clone(),
            description: payload.description.clone(),
            members: payload.members.clone(),
        }
    }
}

mod optional_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::encoding;

    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    struct Bytes(#[serde(with = "encoding::bytes")] Vec<u8>);

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.as_ref().map(|v| Bytes(v.clone())).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Bytes>::deserialize(deserializer)?.map(|b| b.0))
    }
}

// ============================================================================
// TESTS
// ============================================================================
