// Billing handlers - pricing, payment confirmation, invoices.
//
// Checkout itself happens at the payment provider; these endpoints apply
// the outcome. The ledger performs no payment verification - it trusts
// this layer, and the session id makes a replayed confirmation harmless.

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::Plan,
    services::{
        ledger::{GrantKind, InvoiceData},
        pricing::{credits_for_plan, pricing_tiers, PricingTier},
    },
    utils::ServiceError,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct ConfirmPurchaseRequest {
    /// Checkout session id from the payment provider - the idempotency key
    pub session_id: String,
    /// Tier that was purchased
    pub plan: String,
    /// When true the account's plan changes; otherwise this is a credit
    /// top-up and the plan stays put
    #[serde(default = "default_upgrade")]
    pub upgrade_plan: bool,
}

fn default_upgrade() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ActivateSubscriptionRequest {
    pub session_id: String,
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub success: bool,
    pub credits_balance: u32,
    pub plan: String,
    pub message: String,
}

/// GET /billing/pricing - public pricing table
pub async fn pricing(State(_state): State<AppState>) -> Json<Vec<PricingTier>> {
    Json(pricing_tiers())
}

/// POST /billing/confirm - apply a confirmed checkout to the account
pub async fn confirm_purchase(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(req): Json<ConfirmPurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ServiceError> {
    let plan = parse_paid_plan(&req.plan)?;
    let credits = credits_for_plan(plan);

    let grant = if req.upgrade_plan {
        GrantKind::PlanUpgrade(plan)
    } else {
        GrantKind::CreditPurchase
    };

    let balance = state
        .ledger
        .add_credits(&auth_user.username, credits, grant, &req.session_id)
        .await?;

    send_receipt(&state, &auth_user, &req.session_id).await;

    let user = state.ledger.get_user(&auth_user.username).await?;
    Ok(Json(PurchaseResponse {
        success: true,
        credits_balance: balance,
        plan: user.plan.as_str().to_string(),
        message: format!("{} credits added", credits),
    }))
}

/// POST /billing/subscription - activate a monthly plan
pub async fn activate_subscription(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(req): Json<ActivateSubscriptionRequest>,
) -> Result<Json<PurchaseResponse>, ServiceError> {
    let plan = parse_paid_plan(&req.plan)?;
    let monthly_credits = credits_for_plan(plan);

    let balance = state
        .ledger
        .activate_subscription(&auth_user.username, plan, monthly_credits, &req.session_id)
        .await?;

    send_receipt(&state, &auth_user, &req.session_id).await;

    Ok(Json(PurchaseResponse {
        success: true,
        credits_balance: balance,
        plan: plan.as_str().to_string(),
        message: format!("{} subscription active: {} credits/month", plan, monthly_credits),
    }))
}

/// GET /billing/invoice/{session_id} - invoice fields for a purchase
pub async fn invoice(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<InvoiceData>, ServiceError> {
    let invoice = state.ledger.invoice_data(&session_id).await?;
    // Invoices are private to their owner
    if invoice.username != auth_user.username {
        return Err(ServiceError::NotFound);
    }
    Ok(Json(invoice))
}

fn parse_paid_plan(raw: &str) -> Result<Plan, ServiceError> {
    let plan = Plan::from_str(raw.trim().to_lowercase().as_str())
        .map_err(ServiceError::ValidationError)?;
    if !plan.is_paid() {
        return Err(ServiceError::ValidationError(
            "Purchases require a paid plan".to_string(),
        ));
    }
    Ok(plan)
}

/// Receipts are best-effort; a failed send never rolls back a grant
async fn send_receipt(state: &AppState, auth_user: &AuthenticatedUser, session_id: &str) {
    let invoice = match state.ledger.invoice_data(session_id).await {
        Ok(invoice) => invoice,
        Err(e) => {
            tracing::warn!(error = %e, "Invoice lookup failed after purchase");
            return;
        },
    };

    if let Err(e) = state
        .email_service
        .send_purchase_receipt(
            &auth_user.email,
            &auth_user.username,
            &invoice.description,
            invoice.credits,
            invoice.amount_usd,
            &invoice.invoice_number,
        )
        .await
    {
        tracing::warn!(error = %e, "Purchase receipt failed to send");
    }
}
