// Transactional email through the Resend HTTP API.
//
// Three notifications leave this system: password reset links, password
// change alerts, and purchase receipts. Templates are compiled into the
// binary and rendered with handlebars; delivery retries a few times with
// a flat delay before giving up.

use std::sync::Arc;
use std::time::Duration;

use handlebars::Handlebars;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::app_config::EmailConfig;

const SEND_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Email send failed: {0}")]
    SendError(String),

    #[error("Email provider rate limit exceeded")]
    RateLimitExceeded,

    #[error("Email provider unavailable")]
    ServiceUnavailable,
}

/// A rendered message ready for delivery
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Serialize)]
struct ResendPayload {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

#[derive(Clone)]
pub struct EmailService {
    client: Arc<Client>,
    config: EmailConfig,
    templates: Arc<Handlebars<'static>>,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut templates = Handlebars::new();
        Self::register_templates(&mut templates)?;

        Ok(Self {
            client: Arc::new(Client::new()),
            config,
            templates: Arc::new(templates),
        })
    }

    fn register_templates(templates: &mut Handlebars) -> Result<(), EmailError> {
        templates
            .register_template_string(
                "password_reset",
                include_str!("../../templates/email/password_reset.html"),
            )
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        templates
            .register_template_string(
                "password_changed",
                include_str!("../../templates/email/password_changed.html"),
            )
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        templates
            .register_template_string(
                "purchase_receipt",
                include_str!("../../templates/email/purchase_receipt.html"),
            )
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        Ok(())
    }

    /// Send the reset link carrying the raw token
    #[instrument(skip(self, reset_token))]
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        username: &str,
        reset_token: &str,
    ) -> Result<(), EmailError> {
        info!("Sending password reset email");

        let reset_url = format!(
            "{}/reset-password?token={}",
            self.config.frontend_url.trim_end_matches('/'),
            reset_token
        );
        let html = self
            .templates
            .render(
                "password_reset",
                &json!({
                    "username": username,
                    "reset_url": reset_url,
                    "support_email": self.config.support_email,
                }),
            )
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        self.send_with_retry(EmailMessage {
            to: to_email.to_string(),
            subject: "Reset your password".to_string(),
            html,
        })
        .await
    }

    /// Security notification after a successful password change. Sent once,
    /// without retry - by the time a retry would land the user has already
    /// seen the outcome in-app.
    #[instrument(skip(self))]
    pub async fn send_password_change_notification(
        &self,
        to_email: &str,
        username: &str,
    ) -> Result<(), EmailError> {
        info!("Sending password change notification");

        let html = self
            .templates
            .render(
                "password_changed",
                &json!({
                    "username": username,
                    "support_email": self.config.support_email,
                }),
            )
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        self.send(EmailMessage {
            to: to_email.to_string(),
            subject: "Your password was changed".to_string(),
            html,
        })
        .await
    }

    /// Receipt after a confirmed credit purchase
    #[instrument(skip(self))]
    pub async fn send_purchase_receipt(
        &self,
        to_email: &str,
        username: &str,
        description: &str,
        credits: u32,
        amount_usd: u32,
        invoice_number: &str,
    ) -> Result<(), EmailError> {
        info!("Sending purchase receipt");

        let html = self
            .templates
            .render(
                "purchase_receipt",
                &json!({
                    "username": username,
                    "description": description,
                    "credits": credits,
                    "amount_usd": amount_usd,
                    "invoice_number": invoice_number,
                    "support_email": self.config.support_email,
                }),
            )
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        self.send_with_retry(EmailMessage {
            to: to_email.to_string(),
            subject: format!("Receipt {} - thanks for your purchase", invoice_number),
            html,
        })
        .await
    }

    async fn send_with_retry(&self, message: EmailMessage) -> Result<(), EmailError> {
        let mut last_error = EmailError::ServiceUnavailable;
        for attempt in 1..=SEND_RETRIES {
            match self.send(message.clone()).await {
                Ok(()) => return Ok(()),
                // Client-side rejections will not improve on retry
                Err(e @ EmailError::TemplateError(_)) => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "Email send attempt failed");
                    last_error = e;
                    tokio::time::sleep(RETRY_DELAY).await;
                },
            }
        }
        Err(last_error)
    }

    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let payload = ResendPayload {
            from: format!("{} <{}>", self.config.from_name, self.config.from_email),
            to: vec![message.to],
            subject: message.subject,
            html: message.html,
        };

        let response = self
            .client
            .post(&self.config.resend_api_url)
            .header("Authorization", format!("Bearer {}", self.config.resend_api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => {
                info!("Email sent successfully");
                Ok(())
            },
            Ok(res) => {
                let status = res.status();
                let error_text = res
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                error!(%status, error = %error_text, "Email provider rejected send");

                if status.as_u16() == 429 {
                    Err(EmailError::RateLimitExceeded)
                } else if status.is_server_error() {
                    Err(EmailError::ServiceUnavailable)
                } else {
                    Err(EmailError::SendError(format!(
                        "status {}: {}",
                        status, error_text
                    )))
                }
            },
            Err(e) => {
                error!(error = %e, "Network error while sending email");
                Err(EmailError::SendError(format!("Network error: {}", e)))
            },
        }
    }
}
