// Centralized configuration - load all env vars once at startup

use std::env;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // For tests, load .env file first
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env()
});

pub fn config() -> &'static AppConfig {
    &CONFIG
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub email: EmailConfig,
}

impl AppConfig {
    /// Build from environment variables with sensible defaults everywhere
    /// except secrets, which stay empty and fail loudly at the point of use
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            storage: StorageConfig::from_env(),
            security: SecurityConfig::from_env(),
            email: EmailConfig::from_env(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.server.environment == Environment::Production
    }
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .into(),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Explicit data directory; probes first when set
    pub data_dir: Option<PathBuf>,
    /// Hard ceiling on any single disk operation
    pub io_timeout_secs: u64,
}

impl StorageConfig {
    fn from_env() -> Self {
        Self {
            data_dir: env::var("LEDGER_DATA_DIR").ok().map(PathBuf::from),
            io_timeout_secs: env::var("LEDGER_IO_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_access_secret: String,
    pub jwt_access_expiry_secs: u64,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub reset_token_ttl_minutes: i64,
}

impl SecurityConfig {
    fn from_env() -> Self {
        Self {
            jwt_access_secret: env::var("JWT_ACCESS_SECRET").unwrap_or_default(),
            jwt_access_expiry_secs: env::var("JWT_ACCESS_EXPIRY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "lge-backend".to_string()),
            jwt_audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "lge-app".to_string()),
            reset_token_ttl_minutes: env::var("RESET_TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub resend_api_key: String,
    pub resend_api_url: String,
    pub from_email: String,
    pub from_name: String,
    pub support_email: String,
    pub frontend_url: String,
}

impl EmailConfig {
    fn from_env() -> Self {
        Self {
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            resend_api_url: env::var("RESEND_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            from_email: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "noreply@leadgen.example".to_string()),
            from_name: env::var("EMAIL_FROM_NAME")
                .unwrap_or_else(|_| "Lead Generation Empire".to_string()),
            support_email: env::var("SUPPORT_EMAIL")
                .unwrap_or_else(|_| "support@leadgen.example".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        }
    }
}
