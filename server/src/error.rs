//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] scribe_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use scribe_engine::Error as Engine;

        let (status, error_message, correlation_id) = match &self {
            AppError::Database(e) => {
                let correlation_id = uuid::Uuid::new_v4().to_string();
                tracing::error!(correlation_id = %correlation_id, "Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(correlation_id),
                )
            }
            AppError::Engine(e) => {
                let status = match e {
                    Engine::InvalidOperation(_) => StatusCode::BAD_REQUEST,
                    Engine::DocumentNotFound(_)
                    | Engine::SessionNotFound(_)
                    | Engine::LockNotFound(_) => StatusCode::NOT_FOUND,
                    Engine::SessionFull { .. } | Engine::LockConflict { .. } => {
                        StatusCode::CONFLICT
                    }
                    Engine::Unauthorized(_) => StatusCode::FORBIDDEN,
                };
                tracing::debug!("Engine error: {}", e);
                (status, e.to_string(), None)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Internal(msg) => {
                let correlation_id = uuid::Uuid::new_v4().to_string();
                tracing::error!(correlation_id = %correlation_id, "Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(correlation_id),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            correlation_id,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
