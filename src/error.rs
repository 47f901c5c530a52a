//! Error types and Axum response conversions.

use crate::models::ModelError;
use crate::storage::{RepositoryError, SessionError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// HTTP-facing application errors.
///
/// Lower layers report classified errors; anything not mapped to a client error ends up as
/// [`AppError::Internal`], which is logged in full and answered with a generic body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NoRecord => AppError::NotFound,
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Internal(format!("Session error: {}", err))
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Internal(format!("Repository error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Extract status code and JSON body from an AppError response.
    async fn error_response(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn test_internal_hides_details() {
        let (status, body) = error_response(AppError::Internal(
            "Redis connection refused at 10.0.0.5:6379".to_string(),
        ))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
        assert!(!body["error"].as_str().unwrap().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_bad_request() {
        let (status, body) =
            error_response(AppError::BadRequest("Invalid CSRF token".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid CSRF token");
    }

    #[tokio::test]
    async fn test_not_found() {
        let (status, body) = error_response(AppError::NotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not Found");
    }

    #[test]
    fn test_from_model_error() {
        assert!(matches!(
            AppError::from(ModelError::NoRecord),
            AppError::NotFound
        ));
        match AppError::from(ModelError::Hash("bad params".to_string())) {
            AppError::Internal(msg) => assert!(msg.contains("bad params")),
            other => panic!("Expected Internal variant, got {:?}", other),
        }
    }

    #[test]
    fn test_from_session_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        match AppError::from(SessionError::from(serde_err)) {
            AppError::Internal(msg) => assert!(msg.starts_with("Session error")),
            other => panic!("Expected Internal variant, got {:?}", other),
        }
    }

    #[test]
    fn test_from_repository_error() {
        let redis_err = redis::RedisError::from((
            redis::ErrorKind::IoError,
            "test context",
            "connection refused".to_string(),
        ));
        match AppError::from(RepositoryError::from(redis_err)) {
            AppError::Internal(msg) => assert!(msg.contains("connection refused")),
            other => panic!("Expected Internal variant, got {:?}", other),
        }
    }
}
