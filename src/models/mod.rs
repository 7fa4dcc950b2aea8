// Data models for the entitlement ledger

pub mod password_reset;
pub mod transaction;
pub mod user;

pub use password_reset::ResetToken;
pub use transaction::{Transaction, TransactionKind};
pub use user::{DemoStatus, Plan, UserRecord, UserStats, DEFAULT_DEMO_LIMIT};
