use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::leads::collection::StoreError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Each failure class gets its own `code` so the client can render a distinct message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                let code = match e {
                    LlmError::Transport { .. } => "LLM_UNAVAILABLE",
                    LlmError::Unauthorized(_) => "LLM_UNAUTHORIZED",
                    LlmError::EmptyContent => "LLM_EMPTY_CONTENT",
                    LlmError::MalformedContent(_) => "LLM_MALFORMED_CONTENT",
                };
                (StatusCode::BAD_GATEWAY, code, e.to_string())
            }
            AppError::Store(StoreError::NotReady) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_READY",
                "Session identity is not resolved yet".to_string(),
            ),
            AppError::Store(StoreError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Lead {id} not found"),
            ),
            AppError::Store(StoreError::Subscription(msg)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SUBSCRIPTION_ERROR",
                msg.clone(),
            ),
            AppError::Store(StoreError::Database(e)) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::TransportFailure;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_llm_errors_map_to_bad_gateway() {
        let transport = AppError::from(LlmError::Transport {
            attempts: 3,
            last: TransportFailure::Http("reset".to_string()),
        });
        assert_eq!(status_of(transport), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(AppError::from(LlmError::EmptyContent)),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_store_errors_map_by_kind() {
        assert_eq!(
            status_of(AppError::from(StoreError::NotReady)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AppError::from(StoreError::NotFound(uuid::Uuid::nil()))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_validation_is_bad_request() {
        assert_eq!(
            status_of(AppError::Validation("query cannot be empty".to_string())),
            StatusCode::BAD_REQUEST
        );
    }
}
