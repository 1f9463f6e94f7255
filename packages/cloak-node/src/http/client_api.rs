//! Client API handlers (JSON, plus the raw byte variants).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;

use cloak_core::api::{
    parse_keys, CreatePrivacyGroupRequest, DeletePrivacyGroupRequest, FindPrivacyGroupRequest,
    GetPrivacyGroupRequest, ReceiveRequest, ReceiveResponse, SendRequest, SendResponse,
};
use cloak_core::crypto::PublicKey;
use cloak_core::network::KnownNode;
use cloak_core::{Error, Node, PrivacyGroup, PrivacyGroupId, SendParams, StorageKey};

use super::error::ApiResult;
use super::extract::{header_str, JsonBody};

/// Sender key of `/sendraw`
pub const FROM_HEADER: &str = "c11n-from";
/// Comma-separated recipient keys of `/sendraw`; identity of `/receiveraw`
pub const TO_HEADER: &str = "c11n-to";
/// Digest of `/receiveraw`
pub const KEY_HEADER: &str = "c11n-key";

// ── Payloads ──────────────────────────────────────────────────────────────────

/// POST /send
pub async fn send(
    State(node): State<Node>,
    JsonBody(request): JsonBody<SendRequest>,
) -> ApiResult<Json<SendResponse>> {
    let key = node.send(request.into_params()?).await?;
    Ok(Json(SendResponse { key }))
}

/// POST /receive
pub async fn receive(
    State(node): State<Node>,
    JsonBody(request): JsonBody<ReceiveRequest>,
) -> ApiResult<Json<ReceiveResponse>> {
    let (key, to) = request.into_params()?;
    let received = node.receive(&key, to)?;
    Ok(Json(received.into()))
}

/// Raw body in, base64 digest out.
///
/// POST /sendraw
pub async fn send_raw(
    State(node): State<Node>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<String> {
    let from = header_str(&headers, FROM_HEADER)?
        .filter(|v| !v.is_empty())
        .map(PublicKey::from_base64)
        .transpose()?;
    let to = match header_str(&headers, TO_HEADER)? {
        Some(list) => parse_keys(
            list.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect(),
        )?,
        None => Vec::new(),
    };

    let key = node
        .send(SendParams {
            payload: body.to_vec(),
            from,
            to,
            privacy_group_id: None,
        })
        .await?;
    Ok(key.to_base64())
}

/// Digest header in, raw plaintext out.
///
/// POST /receiveraw
pub async fn receive_raw(
    State(node): State<Node>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let key = header_str(&headers, KEY_HEADER)?
        .ok_or_else(|| Error::Validation(format!("{} header is required", KEY_HEADER)))?;
    let key = StorageKey::from_base64(key)?;
    let to = header_str(&headers, TO_HEADER)?
        .filter(|v| !v.is_empty())
        .map(PublicKey::from_base64)
        .transpose()?;

    let received = node.receive(&key, to)?;
    Ok((
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        )],
        received.payload,
    ))
}

// ── Privacy Groups ────────────────────────────────────────────────────────────

/// POST /createPrivacyGroup
pub async fn create_privacy_group(
    State(node): State<Node>,
    JsonBody(request): JsonBody<CreatePrivacyGroupRequest>,
) -> ApiResult<Json<PrivacyGroup>> {
    let group = node.create_privacy_group(request.into_params()?).await?;
    Ok(Json(group))
}

/// POST /getPrivacyGroup
pub async fn get_privacy_group(
    State(node): State<Node>,
    JsonBody(request): JsonBody<GetPrivacyGroupRequest>,
) -> ApiResult<Json<PrivacyGroup>> {
    let id = request.into_id()?;
    Ok(Json(node.get_privacy_group(&id)?))
}

/// Responds with the deleted group's id as a JSON string.
///
/// POST /deletePrivacyGroup
pub async fn delete_privacy_group(
    State(node): State<Node>,
    JsonBody(request): JsonBody<DeletePrivacyGroupRequest>,
) -> ApiResult<Json<PrivacyGroupId>> {
    let (id, from) = request.into_params()?;
    Ok(Json(node.delete_privacy_group(&id, &from).await?))
}

/// POST /findPrivacyGroup
pub async fn find_privacy_group(
    State(node): State<Node>,
    JsonBody(request): JsonBody<FindPrivacyGroupRequest>,
) -> ApiResult<Json<Vec<PrivacyGroup>>> {
    let members = request.into_members()?;
    Ok(Json(node.find_privacy_group(&members)?))
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// GET /knownnodes
pub async fn known_nodes(State(node): State<Node>) -> Json<Vec<KnownNode>> {
    Json(node.known_nodes())
}
