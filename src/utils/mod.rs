// Utility modules

pub mod auth_errors;
pub mod password;
pub mod service_error;
pub mod validation;

pub use auth_errors::{log_auth_failure, AuthError};
pub use password::{hash_password, needs_rehash, verify_password, PasswordConfig, PasswordError};
pub use service_error::ServiceError;
pub use validation::{trim_and_validate_field, trim_optional_field, validate_username};
