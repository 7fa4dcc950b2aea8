// Lead delivery preparation - applies plan-based masking before rows
// leave the system

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    app::AppState, middleware::auth::AuthenticatedUser, services::mask_leads_for_plan,
    utils::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct PrepareLeadsRequest {
    pub leads: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct PrepareLeadsResponse {
    pub success: bool,
    pub plan: String,
    pub leads: Vec<Value>,
}

/// POST /leads/prepare - mask a scraped batch according to the viewer's
/// current plan. The plan comes from the ledger, never from the token.
pub async fn prepare_leads(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(req): Json<PrepareLeadsRequest>,
) -> Result<Json<PrepareLeadsResponse>, ServiceError> {
    let user = state.ledger.get_user(&auth_user.username).await?;
    let leads = mask_leads_for_plan(req.leads, user.plan);

    Ok(Json(PrepareLeadsResponse {
        success: true,
        plan: user.plan.as_str().to_string(),
        leads,
    }))
}
