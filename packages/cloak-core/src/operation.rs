//! Closed set of HTTP operations a node serves.
//!
//! The node binary builds its routers by matching over [`Operation::ALL`],
//! so a new operation without a handler fails to compile.

use std::fmt;

/// Which listener an operation is served on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiSide {
    /// Peer-to-peer listener (`node_port`)
    Node,
    /// Local client listener (`client_port`)
    Client,
}

/// HTTP method of an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

/// Every endpoint of a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Liveness probe on the node listener
    NodeUpcheck,
    /// Store a sealed bundle pushed by a peer
    Push,
    /// Store a privacy group definition pushed by a peer
    PushPrivacyGroup,
    /// Exchange peer registries
    PartyInfo,
    /// Liveness probe on the client listener
    ClientUpcheck,
    /// Seal, store and propagate a payload (JSON)
    Send,
    /// Unseal a stored payload (JSON)
    Receive,
    /// Seal, store and propagate raw bytes
    SendRaw,
    /// Unseal a stored payload into raw bytes
    ReceiveRaw,
    /// Create a PANTHEON privacy group
    CreatePrivacyGroup,
    /// Look up a privacy group by id
    GetPrivacyGroup,
    /// Soft-delete a privacy group
    DeletePrivacyGroup,
    /// Find privacy groups by member set
    FindPrivacyGroup,
    /// List the peer registry
    KnownNodes,
}

impl Operation {
    /// Every operation, node side first
    pub const ALL: [Operation; 14] = [
        Operation::NodeUpcheck,
        Operation::Push,
        Operation::PushPrivacyGroup,
        Operation::PartyInfo,
        Operation::ClientUpcheck,
        Operation::Send,
        Operation::Receive,
        Operation::SendRaw,
        Operation::ReceiveRaw,
        Operation::CreatePrivacyGroup,
        Operation::GetPrivacyGroup,
        Operation::DeletePrivacyGroup,
        Operation::FindPrivacyGroup,
        Operation::KnownNodes,
    ];

    /// Request path
    pub fn path(self) -> &'static str {
        match self {
            Operation::NodeUpcheck | Operation::ClientUpcheck => "/upcheck",
            Operation::Push => "/push",
            Operation::PushPrivacyGroup => "/pushPrivacyGroup",
            Operation::PartyInfo => "/partyinfo",
            Operation::Send => "/send",
            Operation::Receive => "/receive",
            Operation::SendRaw => "/sendraw",
            Operation::ReceiveRaw => "/receiveraw",
            Operation::CreatePrivacyGroup => "/createPrivacyGroup",
            Operation::GetPrivacyGroup => "/getPrivacyGroup",
            Operation::DeletePrivacyGroup => "/deletePrivacyGroup",
            Operation::FindPrivacyGroup => "/findPrivacyGroup",
            Operation::KnownNodes => "/knownnodes",
        }
    }

    /// HTTP method
    pub fn method(self) -> Method {
        match self {
            Operation::NodeUpcheck | Operation::ClientUpcheck | Operation::KnownNodes => {
                Method::Get
            }
            _ => Method::Post,
        }
    }

    /// Listener the operation belongs to
    pub fn side(self) -> ApiSide {
        match self {
            Operation::NodeUpcheck
            | Operation::Push
            | Operation::PushPrivacyGroup
            | Operation::PartyInfo => ApiSide::Node,
            _ => ApiSide::Client,
        }
    }

    /// Operations served on `side`
    pub fn on(side: ApiSide) -> impl Iterator<Item = Operation> {
        Self::ALL.into_iter().filter(move |op| op.side() == side)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
