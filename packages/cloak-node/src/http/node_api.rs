//! Peer API handlers (CBOR).
//!
//! - `POST /push`
//! - `POST /pushPrivacyGroup`
//! - `POST /partyinfo`

use axum::extract::State;

use cloak_core::network::{PartyInfo, PushPrivacyGroupRequest, PushRequest};
use cloak_core::{Node, PrivacyGroupId, StorageKey};

use super::error::ApiResult;
use super::extract::Cbor;

/// Store a bundle pushed by a peer and echo its key.
///
/// POST /push
pub async fn push(
    State(node): State<Node>,
    Cbor(request): Cbor<PushRequest>,
) -> ApiResult<Cbor<StorageKey>> {
    let key = node.push(&request.key, &request.payload)?;
    Ok(Cbor(key))
}

/// Store a privacy group definition pushed by a member's node.
///
/// POST /pushPrivacyGroup
pub async fn push_privacy_group(
    State(node): State<Node>,
    Cbor(request): Cbor<PushPrivacyGroupRequest>,
) -> ApiResult<Cbor<PrivacyGroupId>> {
    let id = node.push_privacy_group(&request.privacy_group_id, &request.group)?;
    Ok(Cbor(id))
}

/// Merge the caller's registry and answer with ours.
///
/// POST /partyinfo
pub async fn party_info(
    State(node): State<Node>,
    Cbor(theirs): Cbor<PartyInfo>,
) -> Cbor<PartyInfo> {
    Cbor(node.party_info(&theirs))
}
