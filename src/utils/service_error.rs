// HTTP-facing service error type for the ledger API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::ledger::LedgerError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found")]
    NotFound,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Insufficient credits")]
    InsufficientCredits(String),

    #[error("Demo allowance exhausted")]
    DemoExhausted,

    #[error("Payment already processed")]
    DuplicatePayment,

    #[error("Internal server error")]
    InternalError,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServiceError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ServiceError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            ServiceError::UsernameTaken => {
                (StatusCode::CONFLICT, "Username already exists".to_string())
            },
            ServiceError::EmailTaken => (
                StatusCode::CONFLICT,
                "Email already registered to another account".to_string(),
            ),
            ServiceError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ServiceError::InsufficientCredits(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            ServiceError::DemoExhausted => (
                StatusCode::PAYMENT_REQUIRED,
                "Demo allowance exhausted - upgrade to continue".to_string(),
            ),
            ServiceError::DuplicatePayment => (
                StatusCode::CONFLICT,
                "This payment session has already been processed".to_string(),
            ),
            ServiceError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// Ledger errors map onto HTTP statuses here; the ledger itself never
// speaks HTTP
impl From<LedgerError> for ServiceError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::UsernameTaken => ServiceError::UsernameTaken,
            LedgerError::EmailTaken => ServiceError::EmailTaken,
            LedgerError::UserNotFound(_) => ServiceError::NotFound,
            LedgerError::InvalidPassword => ServiceError::Unauthorized,
            LedgerError::InsufficientCredits { .. } => {
                ServiceError::InsufficientCredits(error.to_string())
            },
            LedgerError::DemoExhausted => ServiceError::DemoExhausted,
            LedgerError::NotDemoAccount => ServiceError::ValidationError(error.to_string()),
            LedgerError::InvalidPlanChange(_, _) => {
                ServiceError::ValidationError(error.to_string())
            },
            LedgerError::DuplicatePaymentSession(_) => ServiceError::DuplicatePayment,
            LedgerError::PurchaseNotFound(_) => ServiceError::NotFound,
            LedgerError::Validation(msg) => ServiceError::ValidationError(msg),
            LedgerError::Password(e) => {
                tracing::error!(error = %e, "Password hashing failure");
                ServiceError::InternalError
            },
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(error: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(error.to_string())
    }
}
