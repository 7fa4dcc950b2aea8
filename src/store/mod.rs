// Flat-file persistence layer - JSON documents on a probed data directory

pub mod json_store;
pub mod paths;

pub use json_store::{JsonStore, SaveOutcome, StoreError};
pub use paths::resolve_data_dir;

/// Canonical document names
pub const USERS_DOCUMENT: &str = "users_credits.json";
pub const TRANSACTIONS_DOCUMENT: &str = "transactions.json";
pub const RESET_TOKENS_DOCUMENT: &str = "reset_tokens.json";
