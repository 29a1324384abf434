//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Every failure is rendered as `{"error": {"code", "message"}}`. Messages
//! of server-side failures are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request body or parameters rejected (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A stored artifact no longer matches its manifest (500).
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Integrity(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTEGRITY_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Integrity(_) => "Stored artifact failed its integrity check".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Integrity(_) => tracing::error!(error = %self, "serving refused"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<cab_core::IdentifierError> for AppError {
    fn from(err: cab_core::IdentifierError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<cab_store::StoreError> for AppError {
    fn from(err: cab_store::StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<cab_store::ValidationError> for AppError {
    fn from(err: cab_store::ValidationError) -> Self {
        Self::Integrity(err.to_string())
    }
}

impl From<cab_queue::QueueError> for AppError {
    fn from(err: cab_queue::QueueError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn not_found_status_code() {
        let err = AppError::NotFound("missing job".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn bad_request_status_code() {
        let err = AppError::BadRequest("malformed JSON".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn integrity_status_code() {
        let err = AppError::Integrity("hash mismatch".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTEGRITY_ERROR");
    }

    #[test]
    fn identifier_error_is_bad_request() {
        let err = AppError::from(cab_core::TrackId::new("../x").unwrap_err());
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn validation_error_is_integrity() {
        let err = AppError::from(cab_store::ValidationError::ManifestMissing(
            "/cas/echo/c/s/manifest.json".into(),
        ));
        assert!(matches!(err, AppError::Integrity(_)));
    }

    #[tokio::test]
    async fn internal_message_is_not_exposed() {
        let response = AppError::Internal("disk on fire at /secret/path".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(!body.error.message.contains("/secret/path"));
    }

    #[tokio::test]
    async fn client_error_message_is_exposed() {
        let response = AppError::BadRequest("features_path does not exist".into()).into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert!(body.error.message.contains("features_path"));
    }
}
