// Credit and demo allowance handlers.
//
// The check/consume pairs mirror the delivery contract: callers check
// eligibility before launching a scrape and debit only for leads actually
// handed over.

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{DemoStatus, UserStats},
    services::ledger::CreditCheck,
    utils::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct CheckCreditsParams {
    /// Credits needed for the intended delivery
    pub required: u32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConsumeCreditsRequest {
    pub credits_used: u32,
    pub leads_downloaded: u64,
    pub platform: String,
}

#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    pub success: bool,
    pub credits_remaining: u32,
}

#[derive(Debug, Serialize)]
pub struct DemoConsumeResponse {
    pub success: bool,
    pub demo_leads_remaining: u32,
}

/// GET /credits/demo - demo allowance snapshot
pub async fn demo_status(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<Json<DemoStatus>, ServiceError> {
    let status = state.ledger.get_demo_status(&auth_user.username).await?;
    Ok(Json(status))
}

/// POST /credits/demo/consume - debit one delivered demo lead
pub async fn consume_demo_lead(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<Json<DemoConsumeResponse>, ServiceError> {
    let remaining = state.ledger.consume_demo_lead(&auth_user.username).await?;
    Ok(Json(DemoConsumeResponse {
        success: true,
        demo_leads_remaining: remaining,
    }))
}

/// GET /credits/check?required=N - eligibility guard before a delivery
pub async fn check_credits(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Query(params): Query<CheckCreditsParams>,
) -> Result<Json<CreditCheck>, ServiceError> {
    let check = state
        .ledger
        .check_credits(&auth_user.username, params.required)
        .await?;
    Ok(Json(check))
}

/// POST /credits/consume - debit credits for delivered leads
pub async fn consume_credits(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(req): Json<ConsumeCreditsRequest>,
) -> Result<Json<ConsumeResponse>, ServiceError> {
    if req.platform.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Platform is required".to_string(),
        ));
    }

    let remaining = state
        .ledger
        .consume_credits(
            &auth_user.username,
            req.credits_used,
            req.leads_downloaded,
            req.platform.trim(),
        )
        .await?;

    Ok(Json(ConsumeResponse {
        success: true,
        credits_remaining: remaining,
    }))
}

/// GET /credits/stats - lifetime aggregates for the dashboard
pub async fn user_stats(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<Json<UserStats>, ServiceError> {
    let stats = state.ledger.get_user_stats(&auth_user.username).await?;
    Ok(Json(stats))
}
