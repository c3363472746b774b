use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => Self::Validation(msg),
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::Auth(msg) => Self::Unauthorized(msg),
            // The upstream status belongs in the message, the raw payload does not.
            AppError::OpenAI(e) => {
                tracing::error!("Upstream error: {:?}", e);
                Self::Internal(format!("Upstream error: {e}"))
            }
            AppError::LLMParsing(msg) => {
                tracing::error!("Upstream response error: {}", msg);
                Self::Internal(format!("Upstream error: {msg}"))
            }
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                Self::Internal(msg)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                Self::Internal("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Unauthorized(message) => (StatusCode::FORBIDDEN, message),
        };

        let envelope = ErrorEnvelope {
            success: false,
            error,
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(envelope)).into_response()
    }
}

/// Uniform failure shape: callers always see a well-formed envelope, never a
/// stack trace or an upstream payload.
#[derive(Serialize, Debug)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    timestamp: String,
}
