// User account model for the entitlement ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::transaction::Transaction;

/// Plan tier enumeration matching the pricing structure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Demo,     // Free trial - 5 demo leads, no credits
    Starter,  // $97 - 500 lead credits
    Pro,      // $297 - 2,000 lead credits
    Ultimate, // $897 - 5,000 lead credits
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Demo => "demo",
            Plan::Starter => "starter",
            Plan::Pro => "pro",
            Plan::Ultimate => "ultimate",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Demo)
    }

    /// Whether a plan change is allowed. Upgrading out of demo and moving
    /// between paid plans are both fine; nothing ever goes back to demo.
    pub fn can_transition_to(&self, next: Plan) -> bool {
        next.is_paid()
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "demo" => Ok(Plan::Demo),
            "starter" => Ok(Plan::Starter),
            "pro" => Ok(Plan::Pro),
            "ultimate" => Ok(Plan::Ultimate),
            _ => Err(format!("Invalid plan: {}", s)),
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Number of demo leads a fresh account may consume
pub const DEFAULT_DEMO_LIMIT: u32 = 5;

/// One user account as persisted in the users document, keyed by username.
/// Every field carries a serde default so records written by older builds
/// (or hand-edited files) load with safe values instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub credits: u32,
    #[serde(default = "default_plan")]
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_leads_downloaded: u64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub agreed_to_terms: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_agreed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub demo_leads_used: u32,
    #[serde(default = "default_demo_limit")]
    pub demo_limit: u32,
    #[serde(default)]
    pub subscription_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub monthly_credits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_updated_at: Option<DateTime<Utc>>,
}

fn default_plan() -> Plan {
    Plan::Demo
}

fn default_demo_limit() -> u32 {
    DEFAULT_DEMO_LIMIT
}

impl UserRecord {
    /// Fresh demo account. Credits stay at zero until a purchase lands.
    pub fn new_demo(email: String, password_hash: String) -> Self {
        Self {
            email,
            password_hash,
            credits: 0,
            plan: Plan::Demo,
            created_at: Utc::now(),
            last_login: None,
            total_leads_downloaded: 0,
            transactions: Vec::new(),
            agreed_to_terms: false,
            terms_agreed_at: None,
            demo_leads_used: 0,
            demo_limit: DEFAULT_DEMO_LIMIT,
            subscription_active: false,
            subscription_started: None,
            monthly_credits: 0,
            password_updated_at: None,
        }
    }

    pub fn is_demo(&self) -> bool {
        self.plan == Plan::Demo
    }

    pub fn demo_remaining(&self) -> u32 {
        self.demo_limit.saturating_sub(self.demo_leads_used)
    }
}

/// Demo allowance snapshot returned by the ledger's read-only demo queries
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DemoStatus {
    pub is_demo: bool,
    pub used: u32,
    pub remaining: u32,
}

/// Aggregated per-user statistics for dashboard display
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub current_credits: u32,
    pub total_purchased: u64,
    pub credits_used: u64,
    pub total_leads_downloaded: u64,
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub agreed_to_terms: bool,
    pub subscription_active: bool,
    pub monthly_credits: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_conversion() {
        assert_eq!(Plan::Demo.as_str(), "demo");
        assert_eq!(Plan::Ultimate.as_str(), "ultimate");

        assert_eq!(Plan::from_str("starter"), Ok(Plan::Starter));
        assert_eq!(Plan::from_str("pro"), Ok(Plan::Pro));
        assert!(Plan::from_str("enterprise").is_err());
    }

    #[test]
    fn test_plan_transitions() {
        assert!(Plan::Demo.can_transition_to(Plan::Starter));
        assert!(Plan::Starter.can_transition_to(Plan::Ultimate));
        assert!(Plan::Pro.can_transition_to(Plan::Starter));
        // Nothing moves back to demo
        assert!(!Plan::Pro.can_transition_to(Plan::Demo));
        assert!(!Plan::Demo.can_transition_to(Plan::Demo));
    }

    #[test]
    fn test_new_demo_account_defaults() {
        let user = UserRecord::new_demo("a@example.com".into(), "hash".into());
        assert_eq!(user.plan, Plan::Demo);
        assert_eq!(user.credits, 0);
        assert_eq!(user.demo_limit, DEFAULT_DEMO_LIMIT);
        assert_eq!(user.demo_leads_used, 0);
        assert_eq!(user.demo_remaining(), 5);
        assert!(!user.agreed_to_terms);
    }

    #[test]
    fn test_record_loads_with_missing_fields() {
        // A record written before the subscription fields existed
        let raw = r#"{
            "email": "old@example.com",
            "password_hash": "$argon2id$stub",
            "created_at": "2025-11-02T10:00:00Z"
        }"#;
        let user: UserRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(user.plan, Plan::Demo);
        assert_eq!(user.credits, 0);
        assert_eq!(user.demo_limit, DEFAULT_DEMO_LIMIT);
        assert!(!user.subscription_active);
        assert!(user.transactions.is_empty());
    }

    #[test]
    fn test_demo_remaining_never_underflows() {
        let mut user = UserRecord::new_demo("a@example.com".into(), "hash".into());
        user.demo_leads_used = 7;
        user.demo_limit = 5;
        assert_eq!(user.demo_remaining(), 0);
    }
}
