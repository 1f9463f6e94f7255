//! Peer registry: which node URL serves which participant key.
//!
//! Seeded from configuration and grown by party-info exchanges. Entries are
//! only ever added; a merge never replaces the URL of a key already known.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::error::{Error, Result};

/// One (key, url) registry entry
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownNode {
    /// Participant identity
    pub public_key: PublicKey,
    /// Base URL of the node serving it
    pub node_url: String,
}

/// Registry snapshot exchanged during discovery
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    /// Base URL of the node that produced the snapshot
    pub url: String,
    /// Every entry the producer knows
    pub nodes: Vec<KnownNode>,
}

/// Concurrent peer registry
///
/// Cheap to clone; clones share state.
#[derive(Clone, Debug)]
pub struct NetworkNodes {
    /// This node's own base URL
    url: String,
    /// participant key -> node URL
    nodes: Arc<DashMap<PublicKey, String>>,
    /// every node URL known, including our own
    urls: Arc<DashSet<String>>,
}

impl NetworkNodes {
    /// Create a registry for the node reachable at `url`
    pub fn new(url: &str) -> Result<Self> {
        let url = normalize_url(url)?;
        let urls = DashSet::new();
        urls.insert(url.clone());
        Ok(Self {
            url,
            nodes: Arc::new(DashMap::new()),
            urls: Arc::new(urls),
        })
    }

    /// This node's own base URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Record that `keys` are served by `url`. Last writer wins per key.
    pub fn add_node(&self, keys: &[PublicKey], url: &str) -> Result<()> {
        let url = normalize_url(url)?;
        for key in keys {
            self.nodes.insert(*key, url.clone());
        }
        self.urls.insert(url);
        Ok(())
    }

    /// Record a peer URL whose keys are not yet known
    pub fn add_url(&self, url: &str) -> Result<bool> {
        Ok(self.urls.insert(normalize_url(url)?))
    }

    /// URL serving `key`
    pub fn url_for(&self, key: &PublicKey) -> Option<String> {
        self.nodes.get(key).map(|entry| entry.value().clone())
    }

    /// Every known node URL, sorted
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.urls.iter().map(|u| u.key().clone()).collect();
        urls.sort();
        urls
    }

    /// Known URLs other than our own
    pub fn peer_urls(&self) -> Vec<String> {
        self.urls()
            .into_iter()
            .filter(|u| u != &self.url)
            .collect()
    }

    /// Whether any registered key is served by `url`
    pub fn serves_keys(&self, url: &str) -> bool {
        self.nodes.iter().any(|entry| entry.value() == url)
    }

    /// Forget `url` unless a registered key is served by it. Returns
    /// whether it was removed.
    pub fn remove_url(&self, url: &str) -> bool {
        if self.serves_keys(url) {
            return false;
        }
        self.urls.remove(url).is_some()
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no keys are registered
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Snapshot for a party-info exchange
    pub fn export(&self) -> PartyInfo {
        PartyInfo {
            url: self.url.clone(),
            nodes: self.known_nodes(&[]),
        }
    }

    /// Merge a peer's snapshot.
    ///
    /// Unseen keys are added; keys already present keep their URL. Entries
    /// with unusable URLs are skipped. Returns how many keys were added.
    pub fn merge(&self, info: &PartyInfo) -> usize {
        match normalize_url(&info.url) {
            Ok(url) => {
                self.urls.insert(url);
            }
            Err(e) => {
                tracing::debug!(url = info.url.as_str(), error = %e, "Ignoring party info origin");
            }
        }

        let mut added = 0;
        for node in &info.nodes {
            let url = match normalize_url(&node.node_url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!(key = %node.public_key, error = %e, "Skipping known node");
                    continue;
                }
            };

            self.urls.insert(url.clone());
            match self.nodes.entry(node.public_key) {
                dashmap::mapref::entry::Entry::Occupied(existing) => {
                    if existing.get() != &url {
                        tracing::debug!(
                            key = %node.public_key,
                            known = existing.get().as_str(),
                            offered = url.as_str(),
                            "Keeping known URL for key"
                        );
                    }
                }
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(url);
                    added += 1;
                }
            }
        }
        added
    }

    /// Registry entries sorted by key, leaving out `exclude`
    pub fn known_nodes(&self, exclude: &[PublicKey]) -> Vec<KnownNode> {
        let mut nodes: Vec<KnownNode> = self
            .nodes
            .iter()
            .filter(|entry| !exclude.contains(entry.key()))
            .map(|entry| KnownNode {
                public_key: *entry.key(),
                node_url: entry.value().clone(),
            })
            .collect();
        nodes.sort_by(|a, b| a.public_key.cmp(&b.public_key));
        nodes
    }
}

/// Validate an http(s) base URL and drop any trailing '/'
pub fn normalize_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|e| Error::Validation(format!("invalid node URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(trimmed.to_string()),
        _ => Err(Error::Validation(format!(
            "node URL '{}' must be http(s) with a host",
            url
        ))),
    }
}
