// Pricing tiers and the plan/credit decision table.
//
// The allotment for a plan lives here and nowhere else - plans are never
// inferred from a balance threshold; callers state the plan explicitly.

use serde::Serialize;

use crate::models::Plan;

/// One purchasable credit package
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PricingTier {
    pub name: String,
    pub plan: Plan,
    pub credits: u32,
    pub price_usd: u32,
    pub description: String,
    pub features: Vec<String>,
}

/// The public pricing table, cheapest first
pub fn pricing_tiers() -> Vec<PricingTier> {
    vec![
        PricingTier {
            name: "Lead Starter".to_string(),
            plan: Plan::Starter,
            credits: 500,
            price_usd: 97,
            description: "Perfect for small campaigns".to_string(),
            features: vec![
                "500 leads".to_string(),
                "All platforms".to_string(),
                "Basic DMs".to_string(),
                "CSV export".to_string(),
            ],
        },
        PricingTier {
            name: "Lead Pro".to_string(),
            plan: Plan::Pro,
            credits: 2000,
            price_usd: 297,
            description: "Most popular for agencies".to_string(),
            features: vec![
                "2,000 leads".to_string(),
                "All platforms".to_string(),
                "Advanced DMs".to_string(),
                "Priority support".to_string(),
                "Geo-targeting".to_string(),
            ],
        },
        PricingTier {
            name: "Lead Empire".to_string(),
            plan: Plan::Ultimate,
            credits: 5000,
            price_usd: 897,
            description: "Enterprise campaigns".to_string(),
            features: vec![
                "5,000 leads".to_string(),
                "All platforms".to_string(),
                "Custom DMs".to_string(),
                "Dedicated support".to_string(),
                "Advanced filtering".to_string(),
            ],
        },
    ]
}

pub fn tier_for_plan(plan: Plan) -> Option<PricingTier> {
    pricing_tiers().into_iter().find(|t| t.plan == plan)
}

/// Credit allotment that comes with a plan purchase; demo carries none
pub fn credits_for_plan(plan: Plan) -> u32 {
    tier_for_plan(plan).map(|t| t.credits).unwrap_or(0)
}

/// List price in USD for a plan, zero for demo
pub fn price_for_plan(plan: Plan) -> u32 {
    tier_for_plan(plan).map(|t| t.price_usd).unwrap_or(0)
}
