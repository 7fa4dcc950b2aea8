// Application state shared across handlers

use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    services::{CreditLedger, EmailService, JwtService, PasswordResetService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub ledger: Arc<CreditLedger>,
    pub jwt_service: Arc<JwtService>,
    pub password_reset_service: Arc<PasswordResetService>,
    pub email_service: Arc<EmailService>,
}
