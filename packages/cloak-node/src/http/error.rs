//! Mapping of [`cloak_core::Error`] onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use cloak_core::api::ErrorBody;
use cloak_core::Error;

/// Handler error; renders as `{ "error": <code>, "message": <text> }`
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    /// Status code for the wrapped error
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "Request failed");
        } else {
            tracing::debug!(code = self.0.code(), error = %self.0, "Request rejected");
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

/// Handler result
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use cloak_core::crypto::KeyPair;
    use cloak_core::PropagationFailure;

    #[test]
    fn test_status_mapping() {
        let key = KeyPair::generate().public;
        let cases = [
            (Error::KeyNotFound(key), StatusCode::BAD_REQUEST),
            (Error::DecryptionFailed("tag".into()), StatusCode::BAD_REQUEST),
            (Error::Validation("missing".into()), StatusCode::BAD_REQUEST),
            (Error::CorruptPush { key: "k".into() }, StatusCode::BAD_REQUEST),
            (Error::NotFound("k".into()), StatusCode::NOT_FOUND),
            (Error::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                Error::Propagation(vec![PropagationFailure {
                    url: "http://b:8080".into(),
                    recipients: vec![key],
                    reason: "timeout".into(),
                }]),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
