// Password reset token lifecycle over the ledger's JSON storage.
//
// Only the SHA-256 hash of a token is ever persisted. Validation scans the
// active set with constant-time comparison, and the unknown-email path
// burns a fixed delay so response timing does not reveal whether an
// address is registered.

use std::sync::Arc;

use base64::prelude::*;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::ResetToken;
use crate::services::ledger::CreditLedger;
use crate::store::{JsonStore, RESET_TOKENS_DOCUMENT};
use crate::utils::auth_errors::AuthError;

const DEFAULT_TOKEN_TTL_MINUTES: i64 = 15;
const DEFAULT_TIMING_DELAY_MS: u64 = 150;
const DEFAULT_MAX_REQUESTS_PER_WINDOW: usize = 3;
const DEFAULT_WINDOW_HOURS: i64 = 1;

pub struct PasswordResetService {
    ledger: Arc<CreditLedger>,
    store: JsonStore,
    tokens: Mutex<Vec<ResetToken>>,
    token_ttl: Duration,
    timing_attack_delay_ms: u64,
    max_requests_per_window: usize,
    request_window: Duration,
}

#[derive(Debug)]
pub struct ResetTokenInfo {
    pub token: String,      // Raw token (to send in email)
    pub token_hash: String, // Hashed token (what gets persisted)
    pub expires_at: DateTime<Utc>,
}

impl PasswordResetService {
    pub async fn open(ledger: Arc<CreditLedger>, store: JsonStore) -> Self {
        let tokens: Vec<ResetToken> = match store.load(RESET_TOKENS_DOCUMENT).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Failed to read reset tokens document; starting empty");
                Vec::new()
            },
        };

        Self {
            ledger,
            store,
            tokens: Mutex::new(tokens),
            token_ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            timing_attack_delay_ms: DEFAULT_TIMING_DELAY_MS,
            max_requests_per_window: DEFAULT_MAX_REQUESTS_PER_WINDOW,
            request_window: Duration::hours(DEFAULT_WINDOW_HOURS),
        }
    }

    pub fn with_timing_delay(mut self, delay_ms: u64) -> Self {
        self.timing_attack_delay_ms = delay_ms;
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Generate a reset token: 256 bits of entropy, base64url on the wire,
    /// SHA-256 hex at rest
    fn generate_reset_token(&self) -> ResetTokenInfo {
        let mut token_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut token_bytes);

        let token = BASE64_URL_SAFE_NO_PAD.encode(token_bytes);
        let token_hash = hash_token(&token);
        let expires_at = Utc::now() + self.token_ttl;

        ResetTokenInfo {
            token,
            token_hash,
            expires_at,
        }
    }

    /// Create a reset request for an email address. `Ok(None)` means the
    /// address is not registered - the caller responds identically either
    /// way, and this path has already consumed the equalizing delay.
    pub async fn create_reset_request(
        &self,
        email: &str,
    ) -> Result<Option<ResetTokenInfo>, AuthError> {
        let Some((username, user)) = self.ledger.get_user_by_email(email).await else {
            info!("Password reset requested for unknown email");
            tokio::time::sleep(std::time::Duration::from_millis(
                self.timing_attack_delay_ms,
            ))
            .await;
            return Ok(None);
        };

        let token_info = self.generate_reset_token();
        let now = Utc::now();

        let mut tokens = self.tokens.lock().await;

        // Throttle repeated requests inside the window before minting
        // another token
        let window_start = now - self.request_window;
        let recent = tokens
            .iter()
            .filter(|t| t.email.eq_ignore_ascii_case(email) && t.created_at > window_start)
            .count();
        if recent >= self.max_requests_per_window {
            warn!(username = %username, "Password reset rate limit hit");
            return Err(AuthError::RateLimited {
                retry_after_seconds: self.request_window.num_seconds() as u64,
            });
        }

        // Prune dead tokens for this user; active ones keep counting
        // toward the throttle
        tokens.retain(|t| t.username != username || t.is_active(now));
        tokens.push(ResetToken {
            id: Uuid::new_v4(),
            username: username.clone(),
            email: user.email.clone(),
            token_hash: token_info.token_hash.clone(),
            created_at: now,
            expires_at: token_info.expires_at,
            used_at: None,
        });
        self.save(&tokens).await;

        info!(username = %username, "Password reset token created");
        Ok(Some(token_info))
    }

    /// Validate a raw token and consume it. At most one success per token,
    /// and only before expiry; afterwards the token is dead for good.
    pub async fn validate_and_consume_token(
        &self,
        token: &str,
    ) -> Result<(String, String), AuthError> {
        let provided_hash = hash_token(token);
        let now = Utc::now();

        let mut tokens = self.tokens.lock().await;

        let mut matched: Option<usize> = None;
        for (idx, record) in tokens.iter().enumerate() {
            if !record.is_active(now) {
                continue;
            }
            let is_match = provided_hash
                .as_bytes()
                .ct_eq(record.token_hash.as_bytes());
            if is_match.into() {
                matched = Some(idx);
                break;
            }
        }

        let idx = matched.ok_or(AuthError::InvalidToken)?;
        tokens[idx].used_at = Some(now);
        let username = tokens[idx].username.clone();
        let email = tokens[idx].email.clone();
        self.save(&tokens).await;

        info!(username = %username, "Password reset token consumed");
        Ok((username, email))
    }

    /// Drop expired tokens. Leftover expired tokens are harmless; this
    /// just keeps the document small.
    pub async fn cleanup_expired_tokens(&self) -> usize {
        let now = Utc::now();
        let mut tokens = self.tokens.lock().await;

        let before = tokens.len();
        tokens.retain(|t| t.expires_at > now);
        let removed = before - tokens.len();

        if removed > 0 {
            self.save(&tokens).await;
            info!(removed, "Cleaned up expired password reset tokens");
        }
        removed
    }

    /// Active (unused, unexpired) token count for a user
    pub async fn active_token_count(&self, username: &str) -> usize {
        let now = Utc::now();
        let tokens = self.tokens.lock().await;
        tokens
            .iter()
            .filter(|t| t.username == username && t.is_active(now))
            .count()
    }

    async fn save(&self, tokens: &[ResetToken]) {
        match self.store.save(RESET_TOKENS_DOCUMENT, &tokens.to_vec()).await {
            Ok(outcome) if !outcome.is_durable() => {
                warn!("Reset tokens document not durably saved");
            },
            Ok(_) => {},
            Err(e) => warn!(error = %e, "Reset tokens document save failed"),
        }
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
