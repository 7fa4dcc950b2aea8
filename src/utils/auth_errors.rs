// Authentication-specific error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use thiserror::Error;

/// Authentication-specific errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Too many reset requests")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Internal server error")]
    InternalError,
}

/// Standard authentication error response structure
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidToken => StatusCode::BAD_REQUEST,
            AuthError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::RateLimited { .. } => "RATE_LIMITED",
            AuthError::StorageError(_) => "STORAGE_ERROR",
            AuthError::ValidationError(_) => "VALIDATION_ERROR",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AuthError::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        // Infrastructure detail stays in the logs, not in the response body
        let message = match &self {
            AuthError::StorageError(detail) => {
                tracing::error!(detail = %detail, "Auth storage error");
                "Something went wrong, please retry".to_string()
            },
            other => other.to_string(),
        };
        let response = AuthErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.error_code().to_string(),
                retry_after: self.retry_after(),
            },
            message,
        };

        (status, Json(response)).into_response()
    }
}

/// Log helper for failed authentication attempts
pub fn log_auth_failure(identifier: &str, error: &AuthError) {
    tracing::warn!(
        identifier = identifier,
        error_code = error.error_code(),
        "Authentication failure"
    );
}
