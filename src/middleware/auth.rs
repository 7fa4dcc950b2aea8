// Authenticated user info carried through request extensions

use serde::{Deserialize, Serialize};

/// Authenticated user information extracted from the access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub username: String,
    pub token_id: String,
    pub email: String,
    /// Plan at token issue time - entitlement decisions always re-check
    /// the ledger
    pub plan: String,
    pub exp: u64,
}
