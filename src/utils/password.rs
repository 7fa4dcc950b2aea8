// Password hashing and verification using Argon2id

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingError(String),

    #[error("Failed to verify password: {0}")]
    VerificationError(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Argon2id parameters. OWASP's recommended minimums: 19 MiB memory,
/// 2 iterations, single lane.
pub struct PasswordConfig {
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub output_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
            output_length: 32,
        }
    }
}

impl PasswordConfig {
    fn build_hasher(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(self.output_length),
        )
        .map_err(|e| PasswordError::HashingError(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a password with a fresh random salt. Returns the PHC string,
/// which embeds algorithm, parameters, and salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_config(password, &PasswordConfig::default())
}

pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let argon2 = config.build_hasher()?;
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash. A mismatch is Ok(false);
/// only malformed hashes or hasher failures are errors.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationError(e.to_string())),
    }
}

/// Whether a stored hash predates the current parameters and should be
/// rehashed on next successful login
pub fn needs_rehash(hash: &str, config: &PasswordConfig) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    if parsed.algorithm != argon2::Algorithm::Argon2id.ident() {
        return Ok(true);
    }

    for (ident, value) in parsed.params.iter() {
        let current = match ident.as_str() {
            "m" => config.memory_cost,
            "t" => config.time_cost,
            "p" => config.parallelism,
            _ => continue,
        };
        if value.decimal().map(|v| v != current).unwrap_or(false) {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
            output_length: 32,
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password_with_config("Passw0rd!", &fast_config()).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Passw0rd!", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let config = fast_config();
        let h1 = hash_password_with_config("same", &config).unwrap();
        let h2 = hash_password_with_config("same", &config).unwrap();
        assert_ne!(h1, h2);
        assert!(verify_password("same", &h1).unwrap());
        assert!(verify_password("same", &h2).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("password", "sha256:deadbeef");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_needs_rehash_on_param_change() {
        let hash = hash_password_with_config("Passw0rd!", &fast_config()).unwrap();
        assert!(!needs_rehash(&hash, &fast_config()).unwrap());
        // Default params are stronger than the test config
        assert!(needs_rehash(&hash, &PasswordConfig::default()).unwrap());
    }
}
