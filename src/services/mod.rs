// Services module - business logic layer

pub mod email;
pub mod jwt;
pub mod ledger;
pub mod masking;
pub mod password_reset;
pub mod pricing;

// Re-export commonly used services
pub use email::{EmailError, EmailService};
pub use jwt::{AccessTokenClaims, JwtConfig, JwtError, JwtService};
pub use ledger::{
    AdminStats, CreditCheck, CreditLedger, GrantKind, InvoiceData, LedgerError, SystemHealth,
};
pub use masking::mask_leads_for_plan;
pub use password_reset::{PasswordResetService, ResetTokenInfo};
pub use pricing::{credits_for_plan, price_for_plan, pricing_tiers, PricingTier};
