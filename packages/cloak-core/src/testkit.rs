//! In-process peer network for multi-node tests.
//!
//! [`LoopbackNetwork`] is a [`PeerClient`] that routes calls straight into
//! the [`Node`] registered under the target URL, so scenarios with several
//! nodes run without sockets.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::crypto::{KeyPair, PublicKey};
use crate::enclave::Enclave;
use crate::error::{Error, Result};
use crate::keystore::MemoryKeyStore;
use crate::network::{NetworkNodes, PartyInfo, PeerClient};
use crate::node::Node;
use crate::payload::{EncryptedPayload, PrivacyGroupId, PrivacyGroupPayload, StorageKey};
use crate::storage::StorageBackend;

#[derive(Default)]
pub struct LoopbackNetwork {
    nodes: DashMap<String, Node>,
    down: DashSet<String>,
    pushes: DashMap<String, usize>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A fresh in-memory node at `url` with one key
    pub fn spawn_node(self: &Arc<Self>, url: &str) -> (Node, PublicKey) {
        let pair = KeyPair::generate();
        let public = pair.public;
        let enclave = Enclave::new(Arc::new(MemoryKeyStore::with_keys([pair])));
        let network = NetworkNodes::new(url).unwrap();
        let peers: Arc<dyn PeerClient> = self.clone();
        let node = Node::new(enclave, &StorageBackend::Memory, network, peers).unwrap();
        self.nodes.insert(url.to_string(), node.clone());
        (node, public)
    }

    /// One party-info exchange from `a` to `b`
    pub fn introduce(&self, a: &Node, b: &Node) {
        let reply = b.party_info(&a.network().export());
        a.network().merge(&reply);
    }

    /// Make every call to `url` fail as unreachable
    pub fn take_down(&self, url: &str) {
        self.down.insert(url.to_string());
    }

    /// Payload pushes delivered to `url`
    pub fn push_count(&self, url: &str) -> usize {
        self.pushes.get(url).map(|n| *n).unwrap_or(0)
    }

    fn node(&self, url: &str) -> Result<Node> {
        if self.down.contains(url) {
            return Err(Error::PeerUnreachable {
                url: url.to_string(),
                reason: "connection refused".into(),
            });
        }
        self.nodes
            .get(url)
            .map(|n| n.clone())
            .ok_or_else(|| Error::PeerUnreachable {
                url: url.to_string(),
                reason: "no such node".into(),
            })
    }
}

#[async_trait]
impl PeerClient for LoopbackNetwork {
    async fn push(&self, url: &str, key: &StorageKey, payload: &EncryptedPayload) -> Result<()> {
        let node = self.node(url)?;
        node.push(key, payload)?;
        *self.pushes.entry(url.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn push_privacy_group(
        &self,
        url: &str,
        id: &PrivacyGroupId,
        group: &PrivacyGroupPayload,
    ) -> Result<()> {
        self.node(url)?.push_privacy_group(id, group).map(|_| ())
    }

    async fn party_info(&self, url: &str, ours: &PartyInfo) -> Result<PartyInfo> {
        Ok(self.node(url)?.party_info(ours))
    }
}
