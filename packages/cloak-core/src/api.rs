//! Client-facing JSON request and response bodies.
//!
//! Every request field is optional on the wire and checked here, so a
//! malformed request becomes a `Validation` (or `InvalidKey`) error before it
//! reaches the enclave or storage.

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::encoding;
use crate::error::{Error, Result};
use crate::node::{CreatePrivacyGroupParams, Received, SendParams};
use crate::payload::{PrivacyGroupId, StorageKey};

/// `POST /send`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Base64 plaintext
    pub payload: Option<String>,
    /// Base64 sender key
    pub from: Option<String>,
    /// Base64 recipient keys
    pub to: Option<Vec<String>>,
    /// Base64 privacy group id
    pub privacy_group_id: Option<String>,
}

impl SendRequest {
    /// Validate into node parameters
    pub fn into_params(self) -> Result<SendParams> {
        let payload = required(self.payload, "payload")?;
        let privacy_group_id = self
            .privacy_group_id
            .as_deref()
            .map(PrivacyGroupId::from_base64)
            .transpose()?;
        let to = parse_keys(self.to.unwrap_or_default())?;

        Ok(SendParams {
            payload: encoding::from_base64(&payload)?,
            from: self.from.as_deref().map(PublicKey::from_base64).transpose()?,
            to,
            privacy_group_id,
        })
    }
}

/// Response of `POST /send`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    /// Base64 digest
    pub key: StorageKey,
}

/// `POST /receive`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReceiveRequest {
    /// Base64 digest returned by send
    pub key: Option<String>,
    /// Base64 identity to decrypt as
    pub to: Option<String>,
}

impl ReceiveRequest {
    /// Validate into `(digest, identity)`
    pub fn into_params(self) -> Result<(StorageKey, Option<PublicKey>)> {
        let key = StorageKey::from_base64(&required(self.key, "key")?)?;
        let to = self.to.as_deref().map(PublicKey::from_base64).transpose()?;
        Ok((key, to))
    }
}

/// Response of `POST /receive`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveResponse {
    /// Base64 plaintext
    #[serde(with = "encoding::bytes")]
    pub payload: Vec<u8>,
    /// Sealing identity
    pub sender_key: PublicKey,
    /// Group the payload was sent to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_group_id: Option<PrivacyGroupId>,
}

impl From<Received> for ReceiveResponse {
    fn from(received: Received) -> Self {
        Self {
            payload: received.payload,
            sender_key: received.sender,
            privacy_group_id: received.privacy_group_id,
        }
    }
}

/// `POST /createPrivacyGroup`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreatePrivacyGroupRequest {
    /// Base64 member keys
    pub addresses: Option<Vec<String>>,
    /// Base64 creator key
    pub from: Option<String>,
    /// Group name
    pub name: Option<String>,
    /// Group description
    pub description: Option<String>,
    /// Base64 seed; random when absent
    pub seed: Option<String>,
}

impl CreatePrivacyGroupRequest {
    /// Validate into node parameters
    pub fn into_params(self) -> Result<CreatePrivacyGroupParams> {
        let addresses = parse_keys(required(self.addresses, "addresses")?)?;
        let from = PublicKey::from_base64(&required(self.from, "from")?)?;
        let seed = self.seed.as_deref().map(encoding::from_base64).transpose()?;
        if matches!(&seed, Some(s) if s.is_empty()) {
            return Err(Error::Validation("seed must not be empty".into()));
        }

        Ok(CreatePrivacyGroupParams {
            addresses,
            from,
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            seed,
        })
    }
}

/// `POST /getPrivacyGroup`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPrivacyGroupRequest {
    /// Base64 privacy group id
    pub privacy_group_id: Option<String>,
}

impl GetPrivacyGroupRequest {
    /// Validate into a group id
    pub fn into_id(self) -> Result<PrivacyGroupId> {
        PrivacyGroupId::from_base64(&required(self.privacy_group_id, "privacyGroupId")?)
    }
}

/// `POST /deletePrivacyGroup`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePrivacyGroupRequest {
    /// Base64 privacy group id
    pub privacy_group_id: Option<String>,
    /// Base64 key of the deleting member
    pub from: Option<String>,
}

impl DeletePrivacyGroupRequest {
    /// Validate into `(group id, member)`
    pub fn into_params(self) -> Result<(PrivacyGroupId, PublicKey)> {
        let id = PrivacyGroupId::from_base64(&required(self.privacy_group_id, "privacyGroupId")?)?;
        let from = PublicKey::from_base64(&required(self.from, "from")?)?;
        Ok((id, from))
    }
}

/// `POST /findPrivacyGroup`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FindPrivacyGroupRequest {
    /// Base64 member keys
    pub addresses: Option<Vec<String>>,
}

impl FindPrivacyGroupRequest {
    /// Validate into a member list
    pub fn into_members(self) -> Result<Vec<PublicKey>> {
        let members = parse_keys(required(self.addresses, "addresses")?)?;
        if members.is_empty() {
            return Err(Error::Validation("addresses must not be empty".into()));
        }
        Ok(members)
    }
}

/// JSON error body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Numeric error code
    pub error: i32,
    /// Human-readable message
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            error: err.code(),
            message: err.to_string(),
        }
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::Validation(format!("{} is required", field)))
}

/// Parse a list of base64 keys
pub fn parse_keys(keys: Vec<String>) -> Result<Vec<PublicKey>> {
    keys.iter().map(|k| PublicKey::from_base64(k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_get_privacy_group_requires_id() {
        let err = GetPrivacyGroupRequest::default().into_id().unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("privacyGroupId")));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_send_request_from_json() {
        let from = KeyPair::generate().public;
        let to = KeyPair::generate().public;
        let request: SendRequest = serde_json::from_value(serde_json::json!({
            "payload": "aGVsbG8=",
            "from": from.to_base64(),
            "to": [to.to_base64()],
        }))
        .unwrap();

        let params = request.into_params().unwrap();
        assert_eq!(params.payload, b"hello");
        assert_eq!(params.from, Some(from));
        assert_eq!(params.to, vec![to]);
        assert!(params.privacy_group_id.is_none());
    }

    #[test]
    fn test_send_request_rejects_bad_key() {
        let request = SendRequest {
            payload: Some("aGVsbG8=".into()),
            to: Some(vec!["short".into()]),
            ..Default::default()
        };
        assert!(matches!(request.into_params(), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_receive_response_shape() {
        let sender = KeyPair::generate().public;
        let response = ReceiveResponse::from(Received {
            payload: b"hello".to_vec(),
            sender,
            privacy_group_id: None,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["payload"], "aGVsbG8=");
        assert_eq!(json["senderKey"], sender.to_base64());
        assert!(json.get("privacyGroupId").is_none());
    }

    #[test]
    fn test_find_requires_members() {
        let empty = FindPrivacyGroupRequest { addresses: Some(vec![]) };
        assert!(matches!(empty.into_members(), Err(Error::Validation(_))));
        assert!(FindPrivacyGroupRequest::default().into_members().is_err());
    }

    #[test]
    fn test_create_request_defaults() {
        let from = KeyPair::generate().public;
        let params = CreatePrivacyGroupRequest {
            addresses: Some(vec![]),
            from: Some(from.to_base64()),
            ..Default::default()
        }
        .into_params()
        .unwrap();

        assert_eq!(params.from, from);
        assert!(params.seed.is_none());
        assert_eq!(params.name, "");
    }
}
