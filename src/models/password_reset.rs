use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One password reset token as persisted in the reset-tokens document.
/// Only the SHA-256 hash of the token is stored; the raw token exists
/// nowhere but the email that carried it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetToken {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
}

impl ResetToken {
    /// Valid means unused and not yet expired at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

// Request/Response models for API
#[derive(Debug, Serialize, Deserialize, validator::Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, validator::Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 32, max = 64, message = "Invalid reset token format"))]
    pub token: String,

    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub new_password: String,

    pub confirm_password: String,
}

impl ResetPasswordRequest {
    /// Validate that passwords match
    pub fn validate_passwords_match(&self) -> Result<(), String> {
        if self.new_password != self.confirm_password {
            return Err("Passwords do not match".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub success: bool,
    pub message: String,
}
