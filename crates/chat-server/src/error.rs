//! Error types for the chat server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use orchestrator::ChatError;
use thiserror::Error;

/// Errors that can occur while serving a request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// An orchestrator operation failed.
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// Persistence failed outside the orchestrator.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// A required identity header is missing or unreadable.
    #[error("missing or invalid {0} header")]
    MissingHeader(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // A caller addressing another tenant's session learns nothing
            // beyond "not found".
            ApiError::Chat(ChatError::Unauthorized) => {
                (StatusCode::NOT_FOUND, "not found".to_string())
            }
            ApiError::Chat(ChatError::Database(DatabaseError::NotFound { .. }))
            | ApiError::Database(DatabaseError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not found".to_string())
            }
            ApiError::Chat(ChatError::Database(err)) | ApiError::Database(err) => {
                tracing::error!(error = %err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
            ApiError::Chat(ChatError::Gateway(err)) => {
                tracing::error!(error = %err, "gateway error");
                (StatusCode::BAD_GATEWAY, "upstream model error".to_string())
            }
            ApiError::MissingHeader(name) => (
                StatusCode::UNAUTHORIZED,
                format!("missing or invalid {name} header"),
            ),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
