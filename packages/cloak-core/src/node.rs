//! # Node
//!
//! Composes the enclave, the stores, the peer registry and the peer client
//! into the operations a node exposes.
//!
//! ## Send Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              SEND                                       │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  1. Resolve recipients                                                 │
//! │     • privacyGroupId given → members of the stored group               │
//! │     • otherwise → `to`, and LEGACY group of {from} ∪ to is registered  │
//! │                                                                         │
//! │  2. Enclave.seal(plaintext, from, recipients)                          │
//! │                                                                         │
//! │  3. EncryptedPayloadStorage.store → digest                             │
//! │                                                                         │
//! │  4. Push to every remote recipient's node, one push per URL            │
//! │     • all pushes land     → return digest                              │
//! │     • any recipient missed → Propagation error, no digest returned     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Privacy group create and delete follow the same discipline: the
//! definition is pushed to every remote member first, then stored locally.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use rand::RngCore;

use crate::crypto::PublicKey;
use crate::enclave::Enclave;
use crate::error::{Error, PropagationFailure, Result};
use crate::network::{KnownNode, NetworkNodes, PartyInfo, PeerClient};
use crate::payload::{
    EncryptedPayload, PrivacyGroup, PrivacyGroupId, PrivacyGroupPayload, PrivacyGroupState,
    PrivacyGroupType, StorageKey,
};
use crate::storage::{
    EncryptedPayloadStorage, PrivacyGroupStorage, StorageBackend, GROUP_INDEX_NAMESPACE,
    PAYLOAD_NAMESPACE, PRIVACY_GROUP_NAMESPACE,
};

/// Length of a generated PANTHEON seed
pub const SEED_LENGTH: usize = 20;

/// Name given to groups registered implicitly by legacy sends
pub const LEGACY_GROUP_NAME: &str = "legacy";

const LEGACY_GROUP_DESCRIPTION: &str = "Privacy group for legacy sends";

/// Parameters of a send
#[derive(Clone, Debug, Default)]
pub struct SendParams {
    /// Plaintext
    pub payload: Vec<u8>,
    /// Sender; the node's default identity when absent
    pub from: Option<PublicKey>,
    /// Recipients; must be empty when `privacy_group_id` is set
    pub to: Vec<PublicKey>,
    /// Send to the members of this group instead of `to`
    pub privacy_group_id: Option<PrivacyGroupId>,
}

/// Result of a receive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Received {
    /// Plaintext
    pub payload: Vec<u8>,
    /// Sealing identity
    pub sender: PublicKey,
    /// Group the payload was sent to
    pub privacy_group_id: Option<PrivacyGroupId>,
}

/// Parameters of a privacy group creation
#[derive(Clone, Debug)]
pub struct CreatePrivacyGroupParams {
    /// Members; `from` is prepended when missing
    pub addresses: Vec<PublicKey>,
    /// Creating identity, must belong to this node
    pub from: PublicKey,
    /// Human-readable name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Seed for the PANTHEON id; random when absent
    pub seed: Option<Vec<u8>>,
}

/// A relay node
///
/// Cheap to clone; clones share every store and the registry.
#[derive(Clone)]
pub struct Node {
    enclave: Enclave,
    payloads: EncryptedPayloadStorage,
    groups: PrivacyGroupStorage,
    network: NetworkNodes,
    peers: Arc<dyn PeerClient>,
}

impl Node {
    /// Assemble a node and register its own keys under its own URL
    pub fn new(
        enclave: Enclave,
        storage: &StorageBackend,
        network: NetworkNodes,
        peers: Arc<dyn PeerClient>,
    ) -> Result<Self> {
        network.add_node(&enclave.node_keys(), network.url())?;

        Ok(Self {
            payloads: EncryptedPayloadStorage::new(storage.namespace(PAYLOAD_NAMESPACE)),
            groups: PrivacyGroupStorage::new(
                storage.namespace(PRIVACY_GROUP_NAMESPACE),
                storage.namespace(GROUP_INDEX_NAMESPACE),
            ),
            enclave,
            network,
            peers,
        })
    }

    /// The node's enclave
    pub fn enclave(&self) -> &Enclave {
        &self.enclave
    }

    /// The node's peer registry
    pub fn network(&self) -> &NetworkNodes {
        &self.network
    }

    /// The node's peer client
    pub fn peers(&self) -> &Arc<dyn PeerClient> {
        &self.peers
    }

    /// First configured key; used when a request names no identity
    pub fn default_key(&self) -> Result<PublicKey> {
        self.enclave
            .node_keys()
            .first()
            .copied()
            .ok_or_else(|| Error::Validation("node has no keys configured".into()))
    }

    // ========================================================================
    // PAYLOADS
    // ========================================================================

    /// Seal, store and propagate a payload. Returns its digest only once
    /// every remote recipient's node holds a copy.
    pub async fn send(&self, params: SendParams) -> Result<StorageKey> {
        let from = match params.from {
            Some(from) => from,
            None => self.default_key()?,
        };

        let (recipients, group_id, new_legacy) = match params.privacy_group_id {
            Some(id) => {
                if !params.to.is_empty() {
                    return Err(Error::Validation(
                        "send takes either recipients or a privacyGroupId, not both".into(),
                    ));
                }
                (self.groups.get_active(&id)?.members, id, None)
            }
            None => {
                let members = legacy_members(&from, &params.to);
                let id =
                    Enclave::generate_privacy_group_id(&members, None, PrivacyGroupType::Legacy);
                (params.to, id, Some(members))
            }
        };

        // Nothing is persisted until sealing has succeeded
        let sealed = self.enclave.seal(&params.payload, &from, &recipients, Some(group_id))?;
        if let Some(members) = new_legacy {
            self.register_legacy_group(&group_id, members)?;
        }
        let key = self.payloads.store(&sealed)?;

        tracing::info!(
            key = %key,
            from = %from,
            recipients = recipients.len(),
            privacy_group = %group_id,
            "Stored payload"
        );

        self.propagate(&recipients, &from, |url| {
            let peers = Arc::clone(&self.peers);
            let sealed = &sealed;
            async move { peers.push(&url, &key, sealed).await }
        })
        .await?;

        Ok(key)
    }

    /// Unseal a locally stored payload as `to` (default identity when absent)
    pub fn receive(&self, key: &StorageKey, to: Option<PublicKey>) -> Result<Received> {
        let identity = match to {
            Some(to) => to,
            None => self.default_key()?,
        };
        let payload = self.payloads.retrieve(key)?;
        let plaintext = self.enclave.unseal(&payload, &identity)?;

        Ok(Received {
            payload: plaintext,
            sender: payload.sender,
            privacy_group_id: payload.privacy_group_id,
        })
    }

    /// Store a bundle pushed by a peer, verbatim, under `key`
    pub fn push(&self, key: &StorageKey, payload: &EncryptedPayload) -> Result<StorageKey> {
        self.payloads.store_verified(key, payload)?;
        self.adopt_legacy_group(payload)?;
        tracing::debug!(key = %key, sender = %payload.sender, "Accepted pushed payload");
        Ok(*key)
    }

    // ========================================================================
    // PRIVACY GROUPS
    // ========================================================================

    /// Create a PANTHEON group, push it to every member's node, then store it
    pub async fn create_privacy_group(
        &self,
        params: CreatePrivacyGroupParams,
    ) -> Result<PrivacyGroup> {
        if !self.enclave.is_node_key(&params.from) {
            return Err(Error::KeyNotFound(params.from));
        }

        let mut members = params.addresses;
        if !members.contains(&params.from) {
            members.insert(0, params.from);
        }

        let seed = params.seed.unwrap_or_else(|| {
            let mut seed = vec![0u8; SEED_LENGTH];
            rand::rngs::OsRng.fill_bytes(&mut seed);
            seed
        });

        let id = Enclave::generate_privacy_group_id(&members, Some(&seed), PrivacyGroupType::Pantheon);
        let group = PrivacyGroupPayload {
            kind: PrivacyGroupType::Pantheon,
            members,
            seed: Some(seed),
            name: params.name,
            description: params.description,
            state: PrivacyGroupState::Active,
        };

        self.propagate_group(&id, &group, &params.from).await?;
        self.groups.put(&id, &group)?;

        tracing::info!(privacy_group = %id, members = group.members.len(), "Created privacy group");
        Ok(PrivacyGroup::from_payload(id, &group))
    }

    /// Active group by id; `NotFound` if absent or deleted
    pub fn get_privacy_group(&self, id: &PrivacyGroupId) -> Result<PrivacyGroup> {
        let group = self.groups.get_active(id)?;
        Ok(PrivacyGroup::from_payload(*id, &group))
    }

    /// Mark a group DELETED here and on every member's node
    pub async fn delete_privacy_group(
        &self,
        id: &PrivacyGroupId,
        from: &PublicKey,
    ) -> Result<PrivacyGroupId> {
        let group = self.groups.get_active(id)?;
        if !group.has_member(from) {
            return Err(Error::Validation(format!(
                "{} is not a member of privacy group {}",
                from, id
            )));
        }

        let deleted = group.deleted();
        self.propagate_group(id, &deleted, from).await?;
        self.groups.put(id, &deleted)?;

        tracing::info!(privacy_group = %id, "Deleted privacy group");
        Ok(*id)
    }

    /// Every active group whose member set equals `members`
    pub fn find_privacy_group(&self, members: &[PublicKey]) -> Result<Vec<PrivacyGroup>> {
        if members.is_empty() {
            return Err(Error::Validation("addresses must not be empty".into()));
        }
        self.groups.find(members)
    }

    /// Store a group definition pushed by a member's node.
    ///
    /// The id is recomputed from the definition; a mismatch is rejected.
    /// A group already deleted here stays deleted.
    pub fn push_privacy_group(
        &self,
        id: &PrivacyGroupId,
        group: &PrivacyGroupPayload,
    ) -> Result<PrivacyGroupId> {
        let expected = Enclave::generate_privacy_group_id(
            &group.members,
            group.seed.as_deref(),
            group.kind,
        );
        if &expected != id {
            tracing::warn!(claimed = %id, actual = %expected, "Rejected pushed privacy group");
            return Err(Error::CorruptPush {
                key: id.to_base64(),
            });
        }

        let already_deleted = self
            .groups
            .get(id)?
            .map(|existing| !existing.is_active())
            .unwrap_or(false);
        if already_deleted {
            tracing::debug!(privacy_group = %id, "Ignoring push for deleted privacy group");
            return Ok(*id);
        }

        self.groups.put(id, group)?;
        tracing::debug!(privacy_group = %id, state = ?group.state, "Accepted pushed privacy group");
        Ok(*id)
    }

    // ========================================================================
    // DISCOVERY
    // ========================================================================

    /// Merge a peer's registry snapshot and answer with ours
    pub fn party_info(&self, theirs: &PartyInfo) -> PartyInfo {
        let added = self.network.merge(theirs);
        if added > 0 {
            tracing::info!(peer = theirs.url.as_str(), added, "Learned nodes from party info");
        }
        self.network.export()
    }

    /// Registry entries for keys this node does not own
    pub fn known_nodes(&self) -> Vec<KnownNode> {
        self.network.known_nodes(&self.enclave.node_keys())
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Store the LEGACY group `id` unless it is already known
    fn register_legacy_group(&self, id: &PrivacyGroupId, members: Vec<PublicKey>) -> Result<()> {
        if self.groups.get(id)?.is_none() {
            self.groups.put(id, &legacy_group(members))?;
            tracing::debug!(privacy_group = %id, "Registered legacy privacy group");
        }
        Ok(())
    }

    /// Register the LEGACY group of a pushed bundle when its id is
    /// consistent with its recipients
    fn adopt_legacy_group(&self, payload: &EncryptedPayload) -> Result<()> {
        let Some(id) = payload.privacy_group_id else {
            return Ok(());
        };
        let Some(recipients) = payload.recipient_keys() else {
            tracing::debug!(privacy_group = %id, "Listed recipients disagree with key entries");
            return Ok(());
        };
        let legacy = Enclave::generate_privacy_group_id(&recipients, None, PrivacyGroupType::Legacy);
        if legacy == id && self.groups.get(&id)?.is_none() {
            self.groups.put(&id, &legacy_group(recipients))?;
            tracing::debug!(privacy_group = %id, "Registered legacy privacy group from push");
        }
        Ok(())
    }

    async fn propagate_group(
        &self,
        id: &PrivacyGroupId,
        group: &PrivacyGroupPayload,
        from: &PublicKey,
    ) -> Result<()> {
        self.propagate(&group.members, from, |url| {
            let peers = Arc::clone(&self.peers);
            async move { peers.push_privacy_group(&url, id, group).await }
        })
        .await
    }

    /// Run `push` once per remote node serving any of `recipients`.
    ///
    /// Keys held by this node and `from` are skipped. A recipient with no
    /// known node, one mapped to our own URL, or one whose node's push
    /// failed, is reported in the resulting `Propagation` error.
    async fn propagate<F, Fut>(&self, recipients: &[PublicKey], from: &PublicKey, push: F) -> Result<()>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut by_url: BTreeMap<String, Vec<PublicKey>> = BTreeMap::new();
        let mut unknown = Vec::new();

        for recipient in recipients {
            if recipient == from || self.enclave.is_node_key(recipient) {
                continue;
            }
            match self.network.url_for(recipient) {
                // Claims to live here but is not one of our keys
                Some(url) if url == self.network.url() => {
                    if !unknown.contains(recipient) {
                        unknown.push(*recipient);
                    }
                }
                Some(url) => {
                    let keys = by_url.entry(url).or_default();
                    if !keys.contains(recipient) {
                        keys.push(*recipient);
                    }
                }
                None => {
                    if !unknown.contains(recipient) {
                        unknown.push(*recipient);
                    }
                }
            }
        }

        let pushes = by_url.keys().map(|url| push(url.clone()));
        let results = futures::future::join_all(pushes).await;

        let mut failures: Vec<PropagationFailure> = by_url
            .into_iter()
            .zip(results)
            .filter_map(|((url, recipients), result)| {
                result.err().map(|e| PropagationFailure {
                    url,
                    recipients,
                    reason: e.to_string(),
                })
            })
            .collect();

        if !unknown.is_empty() {
            failures.push(PropagationFailure {
                url: String::new(),
                recipients: unknown,
                reason: "no remote node serves recipient".into(),
            });
        }

        if failures.is_empty() {
            return Ok(());
        }

        for failure in &failures {
            tracing::warn!(
                peer = failure.url.as_str(),
                recipients = failure.recipients.len(),
                reason = failure.reason.as_str(),
                "Propagation failed"
            );
        }
        Err(Error::Propagation(failures))
    }
}

/// `{from} ∪ to`, sender first, duplicates dropped
fn legacy_members(from: &PublicKey, to: &[PublicKey]) -> Vec<PublicKey> {
    let mut members = vec![*from];
    for key in to {
        if !members.contains(key) {
            members.push(*key);
        }
    }
    members
}

fn legacy_group(members: Vec<PublicKey>) -> PrivacyGroupPayload {
    PrivacyGroupPayload {
        kind: PrivacyGroupType::Legacy,
        members,
        seed: None,
        name: LEGACY_GROUP_NAME.to_string(),
        description: LEGACY_GROUP_DESCRIPTION.to_string(),
        state: PrivacyGroupState::Active,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::crypto::KeyPair;
    use crate::testkit::LoopbackNetwork;

    #[tokio::test]
    async fn test_send_receive_across_nodes() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, key2) = net.spawn_node("http://node-b:8080");
        net.introduce(&a, &b);

        let digest = a
            .send(SendParams {
                payload: b"hello".to_vec(),
                from: Some(key1),
                to: vec![key2],
                ..Default::default()
            })
            .await
            .unwrap();

        let on_b = b.receive(&digest, Some(key2)).unwrap();
        assert_eq!(on_b.payload, b"hello");
        assert_eq!(on_b.sender, key1);

        // the sender can always read its own send
        let on_a = a.receive(&digest, Some(key1)).unwrap();
        assert_eq!(on_a.payload, b"hello");
    }

    #[tokio::test]
    async fn test_receive_on_node_without_copy_is_not_found() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, _) = net.spawn_node("http://node-b:8080");
        net.introduce(&a, &b);

        let digest = a
            .send(SendParams { payload: b"mine".to_vec(), from: Some(key1), ..Default::default() })
            .await
            .unwrap();

        assert!(matches!(b.receive(&digest, None), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_receive_for_foreign_identity_fails_decryption() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let stranger = KeyPair::generate().public;
        let other = a.enclave().keystore().generate_key_pair(&Default::default()).unwrap();

        let digest = a
            .send(SendParams { payload: b"x".to_vec(), from: Some(key1), ..Default::default() })
            .await
            .unwrap();

        assert!(matches!(a.receive(&digest, Some(stranger)), Err(Error::DecryptionFailed(_))));
        assert!(matches!(a.receive(&digest, Some(other)), Err(Error::DecryptionFailed(_))));
    }

    #[tokio::test]
    async fn test_send_defaults_to_first_node_key() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");

        let digest = a
            .send(SendParams { payload: b"x".to_vec(), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(a.receive(&digest, None).unwrap().sender, key1);
    }

    #[tokio::test]
    async fn test_unreachable_recipient_fails_send() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, key2) = net.spawn_node("http://node-b:8080");
        net.introduce(&a, &b);
        net.take_down("http://node-b:8080");

        let err = a
            .send(SendParams {
                payload: b"hello".to_vec(),
                from: Some(key1),
                to: vec![key2],
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(err.is_recoverable());
        match err {
            Error::Propagation(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].url, "http://node-b:8080");
                assert_eq!(failures[0].recipients, vec![key2]);
            }
            other => panic!("expected propagation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recipient_without_known_node_fails_send() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let nowhere = KeyPair::generate().public;

        let err = a
            .send(SendParams {
                payload: b"hello".to_vec(),
                from: Some(key1),
                to: vec![nowhere],
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Propagation(ref failures) if failures[0].recipients == vec![nowhere]
        ));
    }

    #[tokio::test]
    async fn test_one_push_per_node() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, key2) = net.spawn_node("http://node-b:8080");
        let key3 = b.enclave().keystore().generate_key_pair(&Default::default()).unwrap();
        b.network().add_node(&[key3], "http://node-b:8080").unwrap();
        net.introduce(&a, &b);

        let digest = a
            .send(SendParams {
                payload: b"both".to_vec(),
                from: Some(key1),
                to: vec![key2, key3],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(net.push_count("http://node-b:8080"), 1);
        assert_eq!(b.receive(&digest, Some(key3)).unwrap().payload, b"both");
    }

    #[tokio::test]
    async fn test_legacy_send_twice_creates_one_group() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, key2) = net.spawn_node("http://node-b:8080");
        net.introduce(&a, &b);

        for body in [b"one".as_slice(), b"two".as_slice()] {
            a.send(SendParams {
                payload: body.to_vec(),
                from: Some(key1),
                to: vec![key2],
                ..Default::default()
            })
            .await
            .unwrap();
        }

        let on_a = a.find_privacy_group(&[key2, key1]).unwrap();
        assert_eq!(on_a.len(), 1);
        assert_eq!(on_a[0].kind, PrivacyGroupType::Legacy);

        // the receiving node derived the same group from the pushes
        let on_b = b.find_privacy_group(&[key1, key2]).unwrap();
        assert_eq!(on_b.len(), 1);
        assert_eq!(on_b[0].privacy_group_id, on_a[0].privacy_group_id);
    }

    #[tokio::test]
    async fn test_received_payload_carries_legacy_group() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, key2) = net.spawn_node("http://node-b:8080");
        net.introduce(&a, &b);

        let digest = a
            .send(SendParams {
                payload: b"x".to_vec(),
                from: Some(key1),
                to: vec![key2, key2],
                ..Default::default()
            })
            .await
            .unwrap();

        let expected =
            Enclave::generate_privacy_group_id(&[key2, key1], None, PrivacyGroupType::Legacy);
        assert_eq!(b.receive(&digest, Some(key2)).unwrap().privacy_group_id, Some(expected));
    }

    #[tokio::test]
    async fn test_corrupt_push_rejected() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, _) = net.spawn_node("http://node-b:8080");

        let sealed = a.enclave().seal(b"x", &key1, &[], None).unwrap();
        let wrong = StorageKey::from_bytes([9u8; 32]);

        assert!(matches!(b.push(&wrong, &sealed), Err(Error::CorruptPush { .. })));
        assert!(matches!(b.receive(&wrong, None), Err(Error::NotFound(_))));
        assert_ok!(b.push(&sealed.storage_key(), &sealed));
    }

    #[tokio::test]
    async fn test_failed_seal_leaves_no_legacy_group() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let stranger = KeyPair::generate().public;
        let low_order = PublicKey::from_bytes([0u8; 32]);

        let from_stranger = a
            .send(SendParams {
                payload: b"x".to_vec(),
                from: Some(stranger),
                to: vec![key1],
                ..Default::default()
            })
            .await;
        assert!(matches!(from_stranger, Err(Error::EncryptionFailed(_))));
        assert!(a.find_privacy_group(&[stranger, key1]).unwrap().is_empty());

        let to_low_order = a
            .send(SendParams {
                payload: b"x".to_vec(),
                from: Some(key1),
                to: vec![low_order],
                ..Default::default()
            })
            .await;
        assert!(matches!(to_low_order, Err(Error::EncryptionFailed(_))));
        assert!(a.find_privacy_group(&[key1, low_order]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_key_at_own_url_fails_send() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let phantom = KeyPair::generate().public;
        a.network().add_node(&[phantom], "http://node-a:8080").unwrap();

        let err = a
            .send(SendParams {
                payload: b"hello".to_vec(),
                from: Some(key1),
                to: vec![phantom],
                ..Default::default()
            })
            .await
            .unwrap_err();

        match err {
            Error::Propagation(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].recipients, vec![phantom]);
            }
            other => panic!("expected propagation error, got {:?}", other),
        }
        assert_eq!(net.push_count("http://node-a:8080"), 0);
    }

    #[tokio::test]
    async fn test_push_with_padded_recipients_registers_no_group() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, key2) = net.spawn_node("http://node-b:8080");
        let outsider = KeyPair::generate().public;

        // Lists an extra member with no key entry, under a matching legacy id
        let mut sealed = a.enclave().seal(b"x", &key1, &[key2], None).unwrap();
        let padded = vec![key1, key2, outsider];
        sealed.recipients = Some(padded.clone());
        sealed.privacy_group_id =
            Some(Enclave::generate_privacy_group_id(&padded, None, PrivacyGroupType::Legacy));

        assert_ok!(b.push(&sealed.storage_key(), &sealed));
        assert!(b.find_privacy_group(&padded).unwrap().is_empty());
        assert!(b.find_privacy_group(&[key1, key2]).unwrap().is_empty());
        assert_eq!(b.receive(&sealed.storage_key(), Some(key2)).unwrap().payload, b"x");
    }

    #[tokio::test]
    async fn test_privacy_group_lifecycle() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, key2) = net.spawn_node("http://node-b:8080");
        net.introduce(&a, &b);

        let group = a
            .create_privacy_group(CreatePrivacyGroupParams {
                addresses: vec![key2],
                from: key1,
                name: "desk".into(),
                description: "trading desk".into(),
                seed: None,
            })
            .await
            .unwrap();

        assert_eq!(group.members, vec![key1, key2]);
        assert_eq!(group.kind, PrivacyGroupType::Pantheon);
        assert_eq!(a.get_privacy_group(&group.privacy_group_id).unwrap(), group);
        assert_eq!(b.get_privacy_group(&group.privacy_group_id).unwrap(), group);
        assert_eq!(b.find_privacy_group(&[key2, key1]).unwrap(), vec![group.clone()]);

        // send to the group, read on the other member's node
        let digest = a
            .send(SendParams {
                payload: b"to the desk".to_vec(),
                from: Some(key1),
                privacy_group_id: Some(group.privacy_group_id),
                ..Default::default()
            })
            .await
            .unwrap();
        let received = b.receive(&digest, Some(key2)).unwrap();
        assert_eq!(received.payload, b"to the desk");
        assert_eq!(received.privacy_group_id, Some(group.privacy_group_id));

        // delete from the other side propagates back
        b.delete_privacy_group(&group.privacy_group_id, &key2).await.unwrap();
        assert!(matches!(b.get_privacy_group(&group.privacy_group_id), Err(Error::NotFound(_))));
        assert!(matches!(a.get_privacy_group(&group.privacy_group_id), Err(Error::NotFound(_))));
        assert!(a.find_privacy_group(&[key1, key2]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_group_is_not_found() {
        let net = LoopbackNetwork::new();
        let (a, _) = net.spawn_node("http://node-a:8080");
        let unknown = PrivacyGroupId::from_bytes([1u8; 32]);

        assert!(matches!(a.get_privacy_group(&unknown), Err(Error::NotFound(_))));
        let send = a
            .send(SendParams {
                payload: b"x".to_vec(),
                privacy_group_id: Some(unknown),
                ..Default::default()
            })
            .await;
        assert!(matches!(send, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_same_members_different_seeds_are_distinct_groups() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");

        let create = |seed: &[u8]| CreatePrivacyGroupParams {
            addresses: vec![key1],
            from: key1,
            name: "solo".into(),
            description: String::new(),
            seed: Some(seed.to_vec()),
        };
        let first = a.create_privacy_group(create(b"one")).await.unwrap();
        let second = a.create_privacy_group(create(b"two")).await.unwrap();
        let again = a.create_privacy_group(create(b"one")).await.unwrap();

        assert_ne!(first.privacy_group_id, second.privacy_group_id);
        assert_eq!(first.privacy_group_id, again.privacy_group_id);
        assert_eq!(first.members, vec![key1]);
    }

    #[tokio::test]
    async fn test_create_group_needs_local_creator() {
        let net = LoopbackNetwork::new();
        let (a, _) = net.spawn_node("http://node-a:8080");
        let stranger = KeyPair::generate().public;

        let result = a
            .create_privacy_group(CreatePrivacyGroupParams {
                addresses: vec![],
                from: stranger,
                name: String::new(),
                description: String::new(),
                seed: None,
            })
            .await;
        assert!(matches!(result, Err(Error::KeyNotFound(k)) if k == stranger));
    }

    #[tokio::test]
    async fn test_delete_requires_membership() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let outsider = a.enclave().keystore().generate_key_pair(&Default::default()).unwrap();

        let group = a
            .create_privacy_group(CreatePrivacyGroupParams {
                addresses: vec![],
                from: key1,
                name: "g".into(),
                description: String::new(),
                seed: None,
            })
            .await
            .unwrap();

        assert_err!(a.delete_privacy_group(&group.privacy_group_id, &outsider).await);
        assert_ok!(a.get_privacy_group(&group.privacy_group_id));
    }

    #[tokio::test]
    async fn test_create_group_with_unreachable_member_is_not_stored() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, key2) = net.spawn_node("http://node-b:8080");
        net.introduce(&a, &b);
        net.take_down("http://node-b:8080");

        let result = a
            .create_privacy_group(CreatePrivacyGroupParams {
                addresses: vec![key2],
                from: key1,
                name: "g".into(),
                description: String::new(),
                seed: Some(b"fixed".to_vec()),
            })
            .await;

        assert!(matches!(result, Err(Error::Propagation(_))));
        assert!(a.find_privacy_group(&[key1, key2]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pushed_group_with_wrong_id_rejected() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");

        let group = legacy_group(vec![key1]);
        let wrong = PrivacyGroupId::from_bytes([3u8; 32]);
        assert!(matches!(
            a.push_privacy_group(&wrong, &group),
            Err(Error::CorruptPush { .. })
        ));

        let right = Enclave::generate_privacy_group_id(&[key1], None, PrivacyGroupType::Legacy);
        assert_eq!(a.push_privacy_group(&right, &group).unwrap(), right);
    }

    #[tokio::test]
    async fn test_deleted_group_not_revived_by_push() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let group = legacy_group(vec![key1]);
        let id = Enclave::generate_privacy_group_id(&[key1], None, PrivacyGroupType::Legacy);

        a.push_privacy_group(&id, &group.deleted()).unwrap();
        a.push_privacy_group(&id, &group).unwrap();

        assert!(matches!(a.get_privacy_group(&id), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_party_info_exchange_between_two_nodes() {
        let net = LoopbackNetwork::new();
        let (a, key1) = net.spawn_node("http://node-a:8080");
        let (b, key2) = net.spawn_node("http://node-b:8080");

        // each knows only itself plus the other's URL
        a.network().add_url("http://node-b:8080").unwrap();
        let reply = a
            .peers()
            .party_info("http://node-b:8080", &a.network().export())
            .await
            .unwrap();
        a.network().merge(&reply);

        for node in [&a, &b] {
            assert_eq!(node.network().url_for(&key1).as_deref(), Some("http://node-a:8080"));
            assert_eq!(node.network().url_for(&key2).as_deref(), Some("http://node-b:8080"));
        }
        assert_eq!(
            a.known_nodes(),
            vec![KnownNode {
                public_key: key2,
                node_url: "http://node-b:8080".into()
            }]
        );
    }
}
