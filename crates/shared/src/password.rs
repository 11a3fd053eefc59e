//! Password hashing for accounts created by the operator tooling.
//!
//! Bootstrap accounts are stored as Argon2id PHC strings so that the web
//! application can verify them with any PHC-aware verifier.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

/// Minimum accepted length for a bootstrap password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Error type for password operations.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    TooShort,
}

// OWASP 2024 baseline: 19 MiB, 2 passes, 1 lane.
const MEMORY_COST: u32 = 19456;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;
const OUTPUT_LEN: usize = 32;

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_COST, TIME_COST, PARALLELISM, Some(OUTPUT_LEN))
        .map_err(|e| PasswordError::HashError(format!("invalid Argon2 params: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Rejects passwords that are too weak to seed an account with.
pub fn check_strength(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordError::TooShort);
    }
    Ok(())
}

/// Hashes a password into a PHC string (`$argon2id$v=19$...`).
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_uses_argon2id_parameters() {
        let hash = hash_password("records-admin-pass").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("same_password").unwrap();
        let second = hash_password("same_password").unwrap();
        assert_ne!(first, second);
    }

    fn verifies(password: &str, hash: &str) -> bool {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};

        let parsed = PasswordHash::new(hash).unwrap();
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    #[test]
    fn test_hash_verifies_with_embedded_parameters() {
        let hash = hash_password("clerk-on-duty").unwrap();
        assert!(verifies("clerk-on-duty", &hash));
        assert!(!verifies("clerk-off-duty", &hash));
    }

    #[test]
    fn test_check_strength() {
        assert!(matches!(check_strength("admin"), Err(PasswordError::TooShort)));
        assert!(check_strength("barangay-2024").is_ok());
        // counts characters, not bytes
        assert!(matches!(check_strength("ñññññññ"), Err(PasswordError::TooShort)));
    }

    #[test]
    fn test_error_display() {
        let err = PasswordError::TooShort;
        assert!(err.to_string().contains("at least 8"));
    }
}
