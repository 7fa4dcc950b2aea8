// Library exports for the LGE backend
// This file exposes modules and functions for library consumers

pub mod app;
pub mod app_config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use middleware::auth_middleware;
pub use middleware::AuthenticatedUser;
pub use models::{Plan, Transaction, TransactionKind, UserRecord};
pub use services::{
    AccessTokenClaims, CreditLedger, EmailService, GrantKind, JwtConfig, JwtError, JwtService,
    LedgerError, PasswordResetService,
};
pub use store::{JsonStore, SaveOutcome, StoreError};

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

// Library initialization function for external consumers
pub async fn initialize_app_state() -> anyhow::Result<AppState> {
    // Load environment
    dotenv::dotenv().ok();

    // Initialize config
    let config = app_config::config();

    // Resolve the data directory and open the document store
    info!("Resolving data directory...");
    let (data_dir, backup_dirs) = store::resolve_data_dir(config.storage.data_dir.as_deref());
    let json_store = JsonStore::new(
        data_dir,
        backup_dirs,
        Duration::from_secs(config.storage.io_timeout_secs),
    );

    // Initialize the ledger
    info!("Initializing credit ledger...");
    let ledger = Arc::new(CreditLedger::open(json_store.clone()).await);

    // Initialize services
    let jwt_service = Arc::new(JwtService::new(JwtConfig {
        access_secret: config.security.jwt_access_secret.clone(),
        access_expiry_secs: config.security.jwt_access_expiry_secs,
        issuer: config.security.jwt_issuer.clone(),
        audience: config.security.jwt_audience.clone(),
    }));

    let password_reset_service = Arc::new(
        PasswordResetService::open(ledger.clone(), json_store)
            .await
            .with_token_ttl(chrono::Duration::minutes(
                config.security.reset_token_ttl_minutes,
            )),
    );

    let email_service = Arc::new(EmailService::new(config.email.clone())?);

    Ok(AppState {
        config: Arc::new(config.clone()),
        ledger,
        jwt_service,
        password_reset_service,
        email_service,
    })
}

/// Build the full application router
pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/v1/auth", handlers::public_auth_routes())
        .nest("/v1/auth", handlers::protected_auth_routes(state.clone()))
        .nest("/v1/credits", handlers::credits_routes(state.clone()))
        .nest("/v1/billing", handlers::billing_routes(state.clone()))
        .nest("/v1/leads", handlers::leads_routes(state.clone()))
        .layer(axum::middleware::from_fn(
            middleware::dynamic_cors_middleware,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

// Health check handler
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;
    use axum::Json;

    let health = state.ledger.system_health().await;
    let healthy = health.status == "healthy";
    let timestamp = chrono::Utc::now().to_rfc3339();

    let response = serde_json::json!({
        "status": health.status,
        "service": "lge-backend",
        "timestamp": timestamp,
        "components": {
            "ledger": {
                "users": health.users_count,
                "transactions": health.transactions_count,
                "data_directory": health.data_directory,
                "issues": health.issues,
            }
        }
    });

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
