// Authentication handlers - registration, login, password lifecycle

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::password_reset::{
        ForgotPasswordRequest, ForgotPasswordResponse, ResetPasswordRequest, ResetPasswordResponse,
    },
    services::ledger::LedgerError,
    utils::{log_auth_failure, AuthError, ServiceError},
};

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 320, message = "Email must be less than 320 characters"))]
    pub email: String,

    #[validate(custom(function = "validate_password"))]
    pub password: String,

    pub password_confirmation: String,

    pub accept_terms: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    /// Username or email address
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,

    #[validate(custom(function = "validate_password"))]
    pub new_password: String,

    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: String,
    pub email: String,
    pub plan: String,
    pub demo_limit: u32,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: String,
    pub user: LoginUserInfo,
}

#[derive(Debug, Serialize)]
pub struct LoginUserInfo {
    pub username: String,
    pub email: String,
    pub plan: String,
    pub credits: u32,
    pub demo_leads_remaining: u32,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub username: String,
    pub email: String,
    pub plan: String,
    pub credits: u32,
    pub demo_leads_used: u32,
    pub demo_limit: u32,
    pub total_leads_downloaded: u64,
    pub agreed_to_terms: bool,
    pub subscription_active: bool,
}

/// Password policy: at least 8 chars with upper, lower, digit, and symbol
fn validate_password(password: &str) -> Result<(), validator::ValidationError> {
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if password.len() < 8 {
        return Err(validator::ValidationError::new("password_too_short"));
    }
    if !has_uppercase || !has_lowercase || !has_digit || !has_special {
        return Err(validator::ValidationError::new("password_complexity"));
    }
    Ok(())
}

fn validation_message(errors: &validator::ValidationErrors) -> String {
    for (field, field_errors) in errors.field_errors() {
        if let Some(first) = field_errors.first() {
            return match first.code.as_ref() {
                "password_too_short" => "Password must be at least 8 characters".to_string(),
                "password_complexity" => {
                    "Password needs uppercase, lowercase, a digit, and a symbol".to_string()
                },
                _ => first
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field)),
            };
        }
    }
    "Validation failed".to_string()
}

// =============================================================================
// HANDLERS
// =============================================================================

/// POST /auth/register - create a demo account
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ServiceError> {
    if let Err(errors) = req.validate() {
        return Err(ServiceError::ValidationError(validation_message(&errors)));
    }
    if req.password != req.password_confirmation {
        return Err(ServiceError::ValidationError(
            "Passwords do not match".to_string(),
        ));
    }
    if !req.accept_terms {
        return Err(ServiceError::ValidationError(
            "You must accept the terms of service".to_string(),
        ));
    }

    let record = state
        .ledger
        .create_user(&req.username, &req.email, &req.password)
        .await?;
    // Terms were accepted on the registration form
    state.ledger.agree_to_terms(req.username.trim()).await?;

    let response = AuthResponse {
        success: true,
        data: Some(RegisterResponse {
            username: req.username.trim().to_string(),
            email: record.email,
            plan: record.plan.as_str().to_string(),
            demo_limit: record.demo_limit,
        }),
        message: format!(
            "Demo account created with {} free demo leads",
            record.demo_limit
        ),
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// POST /auth/login - authenticate and issue an access token
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Response {
    match state.ledger.login(&req.identifier, &req.password).await {
        Ok((username, user)) => {
            let (access_token, expires_in) = match state
                .jwt_service
                .generate_access_token(&username, &user.email, user.plan)
            {
                Ok(token) => token,
                Err(e) => {
                    tracing::error!(error = %e, "Access token generation failed");
                    return ServiceError::InternalError.into_response();
                },
            };

            let response = AuthResponse {
                success: true,
                data: Some(LoginResponse {
                    access_token,
                    expires_in,
                    token_type: "Bearer".to_string(),
                    user: LoginUserInfo {
                        username: username.clone(),
                        email: user.email.clone(),
                        plan: user.plan.as_str().to_string(),
                        credits: user.credits,
                        demo_leads_remaining: if user.is_demo() {
                            user.demo_remaining()
                        } else {
                            0
                        },
                    },
                }),
                message: format!("Login successful for {}", username),
            };
            (StatusCode::OK, Json(response)).into_response()
        },
        // Not a security boundary here: the message distinguishes unknown
        // account from wrong password, the status does not
        Err(e @ (LedgerError::UserNotFound(_) | LedgerError::InvalidPassword)) => {
            log_auth_failure(&req.identifier, &AuthError::InvalidCredentials);
            let response = AuthResponse::<LoginResponse> {
                success: false,
                data: None,
                message: e.to_string(),
            };
            (StatusCode::UNAUTHORIZED, Json(response)).into_response()
        },
        Err(e) => ServiceError::from(e).into_response(),
    }
}

/// GET /auth/me - current account snapshot
pub async fn get_current_user(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<Json<AuthResponse<UserInfo>>, ServiceError> {
    let user = state.ledger.get_user(&auth_user.username).await?;

    Ok(Json(AuthResponse {
        success: true,
        data: Some(UserInfo {
            username: auth_user.username,
            email: user.email,
            plan: user.plan.as_str().to_string(),
            credits: user.credits,
            demo_leads_used: user.demo_leads_used,
            demo_limit: user.demo_limit,
            total_leads_downloaded: user.total_leads_downloaded,
            agreed_to_terms: user.agreed_to_terms,
            subscription_active: user.subscription_active,
        }),
        message: "OK".to_string(),
    }))
}

/// POST /auth/forgot-password - request a reset link.
/// The response never reveals whether the address is registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AuthError> {
    req.validate()
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;

    match state
        .password_reset_service
        .create_reset_request(&req.email)
        .await?
    {
        Some(token_info) => {
            let username = state
                .ledger
                .get_user_by_email(&req.email)
                .await
                .map(|(name, _)| name)
                .unwrap_or_default();

            // A failed send is logged, not surfaced - the response stays
            // indistinguishable from the unknown-email case
            if let Err(e) = state
                .email_service
                .send_password_reset_email(&req.email, &username, &token_info.token)
                .await
            {
                tracing::error!(error = %e, "Password reset email failed to send");
            }
        },
        None => {},
    }

    Ok(Json(ForgotPasswordResponse {
        success: true,
        message: "If that email is registered, a reset link has been sent".to_string(),
    }))
}

/// POST /auth/reset-password - complete a reset with a token from email
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, AuthError> {
    req.validate()
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;
    req.validate_passwords_match()
        .map_err(AuthError::ValidationError)?;
    validate_password(&req.new_password)
        .map_err(|_| AuthError::ValidationError("Password does not meet requirements".into()))?;

    let (username, email) = state
        .password_reset_service
        .validate_and_consume_token(&req.token)
        .await?;

    state
        .ledger
        .update_password(&username, &req.new_password)
        .await
        .map_err(|e| AuthError::StorageError(e.to_string()))?;

    if let Err(e) = state
        .email_service
        .send_password_change_notification(&email, &username)
        .await
    {
        tracing::warn!(error = %e, "Password change notification failed to send");
    }

    Ok(Json(ResetPasswordResponse {
        success: true,
        message: "Password has been reset - you can now log in".to_string(),
    }))
}

/// POST /auth/change-password - authenticated password rotation
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<AuthResponse<()>>, ServiceError> {
    if let Err(errors) = req.validate() {
        return Err(ServiceError::ValidationError(validation_message(&errors)));
    }
    if req.new_password != req.confirm_password {
        return Err(ServiceError::ValidationError(
            "Passwords do not match".to_string(),
        ));
    }

    state
        .ledger
        .verify_credentials(&auth_user.username, &req.current_password)
        .await
        .map_err(|_| ServiceError::Unauthorized)?;

    state
        .ledger
        .update_password(&auth_user.username, &req.new_password)
        .await?;

    if let Err(e) = state
        .email_service
        .send_password_change_notification(&auth_user.email, &auth_user.username)
        .await
    {
        tracing::warn!(error = %e, "Password change notification failed to send");
    }

    Ok(Json(AuthResponse {
        success: true,
        data: None,
        message: "Password updated".to_string(),
    }))
}

/// POST /auth/agree-terms - record terms acceptance
pub async fn agree_terms(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<Json<AuthResponse<()>>, ServiceError> {
    state.ledger.agree_to_terms(&auth_user.username).await?;
    Ok(Json(AuthResponse {
        success: true,
        data: None,
        message: "Terms of service accepted".to_string(),
    }))
}

/// DELETE /auth/account - close the account and remove its record
pub async fn close_account(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<Json<AuthResponse<()>>, ServiceError> {
    state.ledger.close_account(&auth_user.username).await?;
    Ok(Json(AuthResponse {
        success: true,
        data: None,
        message: "Account closed and data removed".to_string(),
    }))
}
