//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::content::{ContentError, ValidationErrors};

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed")]
    Validation(ValidationErrors),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Validation(errors) => AppError::Validation(errors),
            ContentError::NotFound { .. } => AppError::NotFound,
            ContentError::UniqueViolation { constraint } => {
                AppError::Conflict(format!("unique constraint '{constraint}' violated"))
            }
            e @ ContentError::RootImmutable(_) => AppError::BadRequest(e.to_string()),
            ContentError::Database(e) => AppError::Database(e),
            ContentError::Other(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal failures are logged, never echoed to the client.
        let body = match self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                json!({"error": "internal server error"})
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                json!({"error": "internal server error"})
            }
            AppError::Validation(errors) => json!({"errors": errors}),
            other => json!({"error": other.to_string()}),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
