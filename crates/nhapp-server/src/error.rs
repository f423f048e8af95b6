use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use uuid::Uuid;

use nhapp_store::StoreError;

use crate::email::EmailError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Expired(String),

    #[error("{0}")]
    Mismatch(String),

    #[error("Upstream service failed: {0}")]
    Dependency(String),

    #[error("Too many requests: {0}")]
    RateLimited(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(Uuid),

    #[error("Blob too large: {size} bytes (max {max})")]
    BlobTooLarge { size: usize, max: usize },

    #[error("Blob storage error: {0}")]
    BlobStorage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Taxonomy name reported to clients in the `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Validation(_) | ServerError::BlobTooLarge { .. } => "ValidationError",
            ServerError::NotFound(_) | ServerError::BlobNotFound(_) => "NotFound",
            ServerError::Expired(_) => "ExpiredError",
            ServerError::Mismatch(_) => "MismatchError",
            ServerError::Dependency(_) => "DependencyError",
            ServerError::RateLimited(_) => "RateLimited",
            ServerError::BlobStorage(_) | ServerError::Internal(_) => "InternalError",
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => ServerError::Validation(msg),
            StoreError::NotFound(_) => ServerError::NotFound(err.to_string()),
            other => {
                tracing::error!(error = %other, "store failure");
                ServerError::Internal(other.to_string())
            }
        }
    }
}

impl From<EmailError> for ServerError {
    fn from(err: EmailError) -> Self {
        tracing::error!(error = %err, "email delivery failed");
        ServerError::Dependency("Failed to send email".to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::NotFound(_) | ServerError::BlobNotFound(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ServerError::Expired(_) => (StatusCode::GONE, self.to_string()),
            ServerError::Mismatch(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Dependency(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ServerError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ServerError::BlobTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            ServerError::BlobStorage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Blob storage error".to_string())
            }
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
            "kind": self.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_their_taxonomy() {
        let err: ServerError = StoreError::NotFound("chat 1".into()).into();
        assert!(matches!(err, ServerError::NotFound(ref m) if m == "chat 1 not found"));

        let err: ServerError = StoreError::Validation("bad email".into()).into();
        assert_eq!(err.kind(), "ValidationError");
        assert_eq!(err.to_string(), "bad email");
    }

    #[test]
    fn status_codes() {
        let cases = [
            (ServerError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ServerError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServerError::Expired("x".into()), StatusCode::GONE),
            (ServerError::Mismatch("x".into()), StatusCode::UNAUTHORIZED),
            (ServerError::Dependency("x".into()), StatusCode::BAD_GATEWAY),
            (ServerError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
