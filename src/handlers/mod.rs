// HTTP route builders

pub mod auth;
pub mod billing;
pub mod credits;
pub mod leads;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::app::AppState;
use crate::middleware::auth_middleware;

// Public authentication routes
pub fn public_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
}

// Authenticated account routes
pub fn protected_auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(auth::get_current_user))
        .route("/change-password", post(auth::change_password))
        .route("/agree-terms", post(auth::agree_terms))
        .route("/account", delete(auth::close_account))
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}

// Credit and demo allowance routes
pub fn credits_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/demo", get(credits::demo_status))
        .route("/demo/consume", post(credits::consume_demo_lead))
        .route("/check", get(credits::check_credits))
        .route("/consume", post(credits::consume_credits))
        .route("/stats", get(credits::user_stats))
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}

// Billing routes; pricing is public, everything else needs auth
pub fn billing_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/confirm", post(billing::confirm_purchase))
        .route("/subscription", post(billing::activate_subscription))
        .route("/invoice/{session_id}", get(billing::invoice))
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/pricing", get(billing::pricing))
        .merge(protected)
}

// Lead delivery routes
pub fn leads_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/prepare", post(leads::prepare_leads))
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}
