//! Party-info discovery.
//!
//! ## How it works
//!
//! 1. A supervisor wakes every `interval` and looks at the registry's URLs.
//! 2. Each peer URL without a discoverer gets one, in its own task.
//! 3. A discoverer sends our snapshot to `/partyinfo`, merges the reply,
//!    then sleeps `interval`.
//! 4. URLs learned from a reply get their own discoverer on the next tick,
//!    so transitive peers are found without configuring every pair.
//!
//! ## Backoff
//!
//! Failures are logged and skipped. A failing peer is retried with
//! exponential backoff (1 s doubling up to 60 s); one success resets it.
//! A learned URL that serves no registered key is forgotten after
//! `MAX_KEYLESS_FAILURES` failures in a row. Configured seeds are never
//! forgotten.
//!
//! ## Shutdown
//!
//! Discoverers live in a `JoinSet` owned by the supervisor task, so
//! aborting the handle returned by `start` stops all of them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tokio::task::{JoinHandle, JoinSet};

use super::client::PeerClient;
use super::nodes::NetworkNodes;
use crate::error::Result;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const MAX_KEYLESS_FAILURES: u32 = 5;

/// Periodic party-info exchange with every known peer
#[derive(Clone)]
pub struct NetworkDiscovery {
    nodes: NetworkNodes,
    client: Arc<dyn PeerClient>,
    interval: Duration,
    /// URLs that already have a discoverer task
    active: Arc<DashSet<String>>,
    /// Peer URLs known at construction; kept even while failing
    seeds: Arc<HashSet<String>>,
}

impl NetworkDiscovery {
    /// Create a discovery service over `nodes`. Its current peer URLs
    /// become the seeds.
    pub fn new(nodes: NetworkNodes, client: Arc<dyn PeerClient>, interval: Duration) -> Self {
        let seeds = nodes.peer_urls().into_iter().collect();
        Self {
            nodes,
            client,
            interval,
            active: Arc::new(DashSet::new()),
            seeds: Arc::new(seeds),
        }
    }

    /// One exchange with `url`. Returns how many keys were learned.
    pub async fn exchange_once(&self, url: &str) -> Result<usize> {
        let theirs = self.client.party_info(url, &self.nodes.export()).await?;
        let added = self.nodes.merge(&theirs);
        if added > 0 {
            tracing::info!(peer = url, added, total = self.nodes.len(), "Learned new nodes");
        }
        Ok(added)
    }

    /// Exchange with every known peer once, concurrently. Failures are
    /// logged and skipped.
    pub async fn exchange_all(&self) -> usize {
        let urls = self.nodes.peer_urls();
        let results = futures::future::join_all(urls.iter().map(|url| self.exchange_once(url))).await;

        urls.iter()
            .zip(results)
            .map(|(url, result)| match result {
                Ok(added) => added,
                Err(e) => {
                    tracing::warn!(peer = url.as_str(), error = %e, "Party info exchange failed");
                    0
                }
            })
            .sum()
    }

    /// Spawn the supervisor. Aborting the handle stops it together with
    /// every discoverer it spawned.
    pub fn start(&self) -> JoinHandle<()> {
        let discovery = self.clone();
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            peers = self.nodes.peer_urls().len(),
            "Network discovery started"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(discovery.interval);
            let mut discoverers = JoinSet::new();
            loop {
                tokio::select! {
                    _ = ticker.tick() => discovery.spawn_new_discoverers(&mut discoverers),
                    Some(_) = discoverers.join_next(), if !discoverers.is_empty() => {}
                }
            }
        })
    }

    fn spawn_new_discoverers(&self, discoverers: &mut JoinSet<()>) {
        for url in self.nodes.peer_urls() {
            if self.active.insert(url.clone()) {
                let discovery = self.clone();
                discoverers.spawn(async move {
                    discovery.discoverer_loop(url).await;
                });
            }
        }
    }

    /// Exchange loop for a single peer. Returns once the URL is forgotten.
    async fn discoverer_loop(&self, url: String) {
        let mut backoff = INITIAL_BACKOFF;
        let mut failures = 0u32;

        loop {
            let wait = match self.exchange_once(&url).await {
                Ok(_) => {
                    backoff = INITIAL_BACKOFF;
                    failures = 0;
                    self.interval
                }
                Err(e) => {
                    failures += 1;
                    if failures >= MAX_KEYLESS_FAILURES && self.retire(&url) {
                        tracing::info!(peer = url.as_str(), failures, "Forgot unreachable peer");
                        return;
                    }
                    tracing::warn!(
                        peer = url.as_str(),
                        error = %e,
                        backoff_secs = backoff.as_secs(),
                        "Party info exchange failed"
                    );
                    let wait = backoff;
                    backoff = next_backoff(backoff);
                    wait
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}

impl NetworkDiscovery {
    /// Drop a learned, keyless `url` from the registry and release its slot
    fn retire(&self, url: &str) -> bool {
        if self.seeds.contains(url) || !self.nodes.remove_url(url) {
            return false;
        }
        self.active.remove(url);
        true
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
