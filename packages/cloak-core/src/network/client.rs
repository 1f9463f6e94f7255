//! Outbound calls to peer nodes.
//!
//! Every call is CBOR over HTTP POST with a bounded timeout. Any transport
//! failure or non-success status surfaces as `PeerUnreachable` carrying the
//! peer URL, so callers can report exactly which node needs a retry.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::nodes::PartyInfo;
use crate::encoding;
use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::payload::{EncryptedPayload, PrivacyGroupId, PrivacyGroupPayload, StorageKey};

/// Content type of every peer request and response body
pub const CBOR_CONTENT_TYPE: &str = "application/cbor";

/// Body of `POST /push`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Digest the sender stored the bundle under
    pub key: StorageKey,
    /// The sealed bundle, verbatim
    pub payload: EncryptedPayload,
}

/// Body of `POST /pushPrivacyGroup`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPrivacyGroupRequest {
    /// Id the sender stored the group under
    pub privacy_group_id: PrivacyGroupId,
    /// Group definition (ACTIVE or DELETED)
    pub group: PrivacyGroupPayload,
}

/// Calls a node makes on its peers
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Replicate a sealed bundle to the node at `url`
    async fn push(&self, url: &str, key: &StorageKey, payload: &EncryptedPayload) -> Result<()>;

    /// Replicate a privacy group definition to the node at `url`
    async fn push_privacy_group(
        &self,
        url: &str,
        id: &PrivacyGroupId,
        group: &PrivacyGroupPayload,
    ) -> Result<()>;

    /// Send our registry snapshot to `url` and get theirs back
    async fn party_info(&self, url: &str, ours: &PartyInfo) -> Result<PartyInfo>;
}

/// [`PeerClient`] over HTTP
#[derive(Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    /// Create a client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn post<B, R>(&self, base: &str, operation: Operation, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", base.trim_end_matches('/'), operation.path());
        let unreachable = |reason: String| Error::PeerUnreachable {
            url: base.to_string(),
            reason,
        };

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, CBOR_CONTENT_TYPE)
            .body(encoding::to_cbor(body)?)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        if !status.is_success() {
            let detail = String::from_utf8_lossy(&bytes);
            return Err(unreachable(format!("{} returned {}: {}", operation, status, detail)));
        }

        encoding::from_cbor(&bytes)
            .map_err(|e| unreachable(format!("malformed {} response: {}", operation, e)))
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn push(&self, url: &str, key: &StorageKey, payload: &EncryptedPayload) -> Result<()> {
        let request = PushRequest {
            key: *key,
            payload: payload.clone(),
        };
        let stored: StorageKey = self.post(url, Operation::Push, &request).await?;
        if &stored != key {
            return Err(Error::PeerUnreachable {
                url: url.to_string(),
                reason: format!("peer stored {} under {}", key, stored),
            });
        }
        Ok(())
    }

    async fn push_privacy_group(
        &self,
        url: &str,
        id: &PrivacyGroupId,
        group: &PrivacyGroupPayload,
    ) -> Result<()> {
        let request = PushPrivacyGroupRequest {
            privacy_group_id: *id,
            group: group.clone(),
        };
        let stored: PrivacyGroupId = self.post(url, Operation::PushPrivacyGroup, &request).await?;
        if &stored != id {
            return Err(Error::PeerUnreachable {
                url: url.to_string(),
                reason: format!("peer stored group {} as {}", id, stored),
            });
        }
        Ok(())
    }

    async fn party_info(&self, url: &str, ours: &PartyInfo) -> Result<PartyInfo> {
        self.post(url, Operation::PartyInfo, ours).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_peer_names_url() {
        let client = HttpPeerClient::new(Duration::from_millis(200)).unwrap();
        let info = PartyInfo {
            url: "http://127.0.0.1:1".into(),
            nodes: vec![],
        };

        // Port 1 is never listening
        let err = client.party_info("http://127.0.0.1:1", &info).await.unwrap_err();

        assert!(err.is_recoverable());
        assert!(matches!(err, Error::PeerUnreachable { url, .. } if url == "http://127.0.0.1:1"));
    }
}
