// HS256 access tokens for the API shell.
//
// Sessions here are short-lived bearer tokens only - no refresh rotation,
// no server-side revocation list. The ledger itself never sees a token;
// handlers resolve the bearer to a username and call ledger operations
// with it.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::Plan;

const DEFAULT_ACCESS_EXPIRY_SECS: u64 = 3600;

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Missing required environment variable: {0}")]
    MissingSecret(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token generation failed: {0}")]
    Generation(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_expiry_secs: u64,
    pub issuer: String,
    pub audience: String,
}

// Manual Debug keeps the secret out of logs
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"<redacted>")
            .field("access_expiry_secs", &self.access_expiry_secs)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, JwtError> {
        let access_secret = std::env::var("JWT_ACCESS_SECRET")
            .map_err(|_| JwtError::MissingSecret("JWT_ACCESS_SECRET".to_string()))?;
        let access_expiry_secs = std::env::var("JWT_ACCESS_EXPIRY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_ACCESS_EXPIRY_SECS);

        Ok(Self {
            access_secret,
            access_expiry_secs,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "lge-backend".to_string()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "lge-app".to_string()),
        })
    }

    pub fn for_test() -> Self {
        Self {
            access_secret: "test-secret-key-not-for-production".to_string(),
            access_expiry_secs: DEFAULT_ACCESS_EXPIRY_SECS,
            issuer: "lge-backend".to_string(),
            audience: "lge-app".to_string(),
        }
    }
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// Username (subject)
    pub sub: String,
    /// JWT ID
    pub jti: String,
    pub email: String,
    /// Plan tier at issue time (display only - entitlement checks always
    /// go through the ledger)
    pub plan: String,
    pub aud: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.access_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.access_secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn from_env() -> Result<Self, JwtError> {
        Ok(Self::new(JwtConfig::from_env()?))
    }

    pub fn generate_access_token(
        &self,
        username: &str,
        email: &str,
        plan: Plan,
    ) -> Result<(String, u64), JwtError> {
        let now = Utc::now().timestamp() as u64;
        let claims = AccessTokenClaims {
            sub: username.to_string(),
            jti: Uuid::new_v4().to_string(),
            email: email.to_string(),
            plan: plan.as_str().to_string(),
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
            iat: now,
            exp: now + self.config.access_expiry_secs,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Generation(e.to_string()))?;

        Ok((token, self.config.access_expiry_secs))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);

        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}
