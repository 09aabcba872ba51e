use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::auth::AuthError;
use common::database::{is_foreign_key_violation, is_unique_violation};
use janitor::CleanupError;
use serde_json::json;
use thiserror::Error;

/// Errors returned by route handlers, rendered as `{ "error", "message" }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Auth(AuthError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Map constraint violations to client errors; anything else stays a 500.
    pub fn from_write(error: sqlx::Error, conflict: &str, missing_parent: &str) -> Self {
        if is_unique_violation(&error) {
            Self::conflict(conflict)
        } else if is_foreign_key_violation(&error) {
            Self::validation(missing_parent)
        } else {
            Self::Database(error)
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Auth(err) => {
                StatusCode::from_u16(err.status_code).unwrap_or(StatusCode::UNAUTHORIZED)
            }
            ApiError::Database(_) | ApiError::Cleanup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Auth(err) if err.status_code == 400 => "bad_request",
            ApiError::Auth(err) if err.status_code == 403 => "forbidden",
            ApiError::Auth(_) => "unauthorized",
            ApiError::Database(_) | ApiError::Cleanup(_) => "internal_error",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Auth(err) => err.message.clone(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            log::error!("Request failed: {message}");
        }
        (
            status,
            Json(json!({
                "error": self.code(),
                "message": message,
            })),
        )
            .into_response()
    }
}
