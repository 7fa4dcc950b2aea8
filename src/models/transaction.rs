// Transaction log entries - the ledger's append-only audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::Plan;

/// Every balance-affecting event is recorded as exactly one of these
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    LeadDownload,
    CreditPurchase,
    PlanUpgrade,
    DemoUsage,
    PasswordUpdate,
    SubscriptionActivation,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::LeadDownload => "lead_download",
            TransactionKind::CreditPurchase => "credit_purchase",
            TransactionKind::PlanUpgrade => "plan_upgrade",
            TransactionKind::DemoUsage => "demo_usage",
            TransactionKind::PasswordUpdate => "password_update",
            TransactionKind::SubscriptionActivation => "subscription_activation",
        }
    }

    /// Kinds that credit the account and therefore carry a payment session id
    pub fn is_grant(&self) -> bool {
        matches!(
            self,
            TransactionKind::CreditPurchase
                | TransactionKind::PlanUpgrade
                | TransactionKind::SubscriptionActivation
        )
    }
}

/// One immutable audit record. Appended to both the global transaction log
/// and the owning user's embedded list within the same save; never mutated
/// or removed afterwards.
///
/// Kind-specific fields are optional and omitted from the JSON when absent,
/// matching the persisted document shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub username: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_added: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leads_downloaded: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_credits: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "stripe_session_id"
    )]
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Balance after a debit (lead_download, demo_usage)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_remaining: Option<u32>,
    /// Balance after a grant (credit_purchase, plan_upgrade, subscription)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_after: Option<u32>,
}

impl Transaction {
    fn base(username: &str, kind: TransactionKind) -> Self {
        Self {
            username: username.to_string(),
            kind,
            credits_used: None,
            credits_added: None,
            leads_downloaded: None,
            platform: None,
            plan: None,
            old_plan: None,
            new_plan: None,
            monthly_credits: None,
            session_id: None,
            timestamp: Utc::now(),
            credits_remaining: None,
            credits_after: None,
        }
    }

    pub fn lead_download(
        username: &str,
        credits_used: u32,
        leads_downloaded: u64,
        platform: &str,
        credits_remaining: u32,
    ) -> Self {
        Self {
            credits_used: Some(credits_used),
            leads_downloaded: Some(leads_downloaded),
            platform: Some(platform.to_string()),
            credits_remaining: Some(credits_remaining),
            ..Self::base(username, TransactionKind::LeadDownload)
        }
    }

    pub fn demo_usage(username: &str, used: u32, remaining: u32) -> Self {
        Self {
            credits_used: Some(used),
            credits_remaining: Some(remaining),
            ..Self::base(username, TransactionKind::DemoUsage)
        }
    }

    pub fn credit_purchase(
        username: &str,
        credits_added: u32,
        plan: Plan,
        session_id: &str,
        credits_after: u32,
    ) -> Self {
        Self {
            credits_added: Some(credits_added),
            plan: Some(plan),
            session_id: Some(session_id.to_string()),
            credits_after: Some(credits_after),
            ..Self::base(username, TransactionKind::CreditPurchase)
        }
    }

    pub fn plan_upgrade(
        username: &str,
        credits_added: u32,
        old_plan: Plan,
        new_plan: Plan,
        session_id: &str,
        credits_after: u32,
    ) -> Self {
        Self {
            credits_added: Some(credits_added),
            old_plan: Some(old_plan),
            new_plan: Some(new_plan),
            plan: Some(new_plan),
            session_id: Some(session_id.to_string()),
            credits_after: Some(credits_after),
            ..Self::base(username, TransactionKind::PlanUpgrade)
        }
    }

    pub fn subscription_activation(
        username: &str,
        old_plan: Plan,
        new_plan: Plan,
        monthly_credits: u32,
        session_id: &str,
    ) -> Self {
        Self {
            old_plan: Some(old_plan),
            new_plan: Some(new_plan),
            plan: Some(new_plan),
            monthly_credits: Some(monthly_credits),
            credits_added: Some(monthly_credits),
            session_id: Some(session_id.to_string()),
            credits_after: Some(monthly_credits),
            ..Self::base(username, TransactionKind::SubscriptionActivation)
        }
    }

    pub fn password_update(username: &str) -> Self {
        Self::base(username, TransactionKind::PasswordUpdate)
    }

    /// The post-mutation balance snapshot, whichever side recorded it
    pub fn balance_snapshot(&self) -> Option<u32> {
        self.credits_remaining.or(self.credits_after)
    }
}
