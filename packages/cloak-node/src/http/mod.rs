//! HTTP surface of a node.
//!
//! Two routers share one [`Node`]:
//!
//! | Router | Listener | Encoding | Operations |
//! |--------|----------|----------|------------|
//! | [`node_router`] | `node_port` | CBOR | upcheck, push, pushPrivacyGroup, partyinfo |
//! | [`client_router`] | `client_port` | JSON / raw | upcheck, send, receive, sendraw, receiveraw, privacy groups, knownnodes |
//!
//! Routes come from [`Operation::on`], and [`handler`] matches every
//! operation, so an operation without a handler does not compile.

pub mod client_api;
pub mod error;
pub mod extract;
pub mod node_api;

use axum::http::Method;
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use cloak_core::{ApiSide, Node, Operation};

/// Body of both upcheck endpoints
pub const UPCHECK_RESPONSE: &str = "I'm up!";

/// Peer-facing router
pub fn node_router(node: Node) -> Router {
    routes(ApiSide::Node)
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

/// Client-facing router
pub fn client_router(node: Node) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    routes(ApiSide::Client)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

fn routes(side: ApiSide) -> Router<Node> {
    Operation::on(side).fold(Router::new(), |router, op| {
        router.route(op.path(), handler(op))
    })
}

fn handler(op: Operation) -> MethodRouter<Node> {
    match op {
        Operation::NodeUpcheck | Operation::ClientUpcheck => get(upcheck),
        Operation::Push => post(node_api::push),
        Operation::PushPrivacyGroup => post(node_api::push_privacy_group),
        Operation::PartyInfo => post(node_api::party_info),
        Operation::Send => post(client_api::send),
        Operation::Receive => post(client_api::receive),
        Operation::SendRaw => post(client_api::send_raw),
        Operation::ReceiveRaw => post(client_api::receive_raw),
        Operation::CreatePrivacyGroup => post(client_api::create_privacy_group),
        Operation::GetPrivacyGroup => post(client_api::get_privacy_group),
        Operation::DeletePrivacyGroup => post(client_api::delete_privacy_group),
        Operation::FindPrivacyGroup => post(client_api::find_privacy_group),
        Operation::KnownNodes => get(client_api::known_nodes),
    }
}

/// GET /upcheck
async fn upcheck() -> &'static str {
    UPCHECK_RESPONSE
}
