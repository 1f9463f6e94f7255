//! # Network Module
//!
//! Everything a node needs to find and talk to its peers.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`NetworkNodes`] | Concurrent key -> URL registry |
//! | [`PeerClient`] | Outbound push / party-info calls |
//! | [`NetworkDiscovery`] | Periodic party-info exchange with backoff |

mod client;
mod discovery;
mod nodes;

pub use client::{
    HttpPeerClient, PeerClient, PushPrivacyGroupRequest, PushRequest, CBOR_CONTENT_TYPE,
};
pub use discovery::NetworkDiscovery;
pub use nodes::{normalize_url, KnownNode, NetworkNodes, PartyInfo};
