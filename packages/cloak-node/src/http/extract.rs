//! Body extractors whose rejections use the node's error envelope.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

use cloak_core::encoding;
use cloak_core::network::CBOR_CONTENT_TYPE;
use cloak_core::Error;

use super::error::ApiError;

/// CBOR request or response body (peer API)
#[derive(Debug, Clone)]
pub struct Cbor<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Cbor<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| Error::Validation(e.body_text()))?;
        let value = encoding::from_cbor(&bytes)
            .map_err(|e| Error::Validation(format!("malformed CBOR body: {}", e)))?;
        Ok(Cbor(value))
    }
}

impl<T: Serialize> IntoResponse for Cbor<T> {
    fn into_response(self) -> Response {
        match encoding::to_cbor(&self.0) {
            Ok(bytes) => (
                [(header::CONTENT_TYPE, HeaderValue::from_static(CBOR_CONTENT_TYPE))],
                bytes,
            )
                .into_response(),
            Err(e) => ApiError(e).into_response(),
        }
    }
}

/// JSON request body (client API)
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| Error::Validation(e.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// Value of a header, if present and valid text
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map(str::trim)
                .map_err(|_| ApiError(Error::Validation(format!("{} is not valid text", name))))
        })
        .transpose()
}
