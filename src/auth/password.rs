//! Password hashing and verification
//!
//! Uses bcrypt for secure password hashing. Unsalted SHA-256 hex digests
//! written by older provisioning scripts are still accepted on login.

use crate::error::AppError;
use bcrypt::{hash, verify, DEFAULT_COST};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored hash
///
/// An unreadable stored hash never matches.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    if is_legacy_digest(hash) {
        let digest = format!("{:x}", Sha256::digest(password.as_bytes()));
        let stored = hash.to_ascii_lowercase();
        return Ok(digest.as_bytes().ct_eq(stored.as_bytes()).into());
    }

    match verify(password, hash) {
        Ok(matches) => Ok(matches),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            Ok(false)
        }
    }
}

fn is_legacy_digest(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}
