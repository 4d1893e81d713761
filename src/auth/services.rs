use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::error;

use crate::error::{AppError, AppResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Salted argon2id PHC string for a new account or password change.
pub fn hash_password(plain: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    match Argon2::default().hash_password(plain.as_bytes(), &salt) {
        Ok(phc) => Ok(phc.to_string()),
        Err(e) => {
            error!(error = %e, "password hashing failed");
            Err(AppError::internal(e))
        }
    }
}

/// Checks `plain` against a stored hash. A stored value that is not a PHC
/// string is an internal error, a mismatch is `Ok(false)`.
pub fn verify_password(plain: &str, stored: &str) -> AppResult<bool> {
    let phc = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is unreadable");
        AppError::internal(e)
    })?;
    let matched = Argon2::default()
        .verify_password(plain.as_bytes(), &phc)
        .is_ok();
    Ok(matched)
}

/// Both fields present and equal.
pub(crate) fn check_new_password(new: &str, confirm: &str) -> AppResult<()> {
    if new.is_empty() || confirm.is_empty() {
        return Err(AppError::Validation(
            "New Password and New Password Confirm cannot be empty".into(),
        ));
    }
    if new != confirm {
        return Err(AppError::Validation(
            "New Password and New Password Confirm must be same".into(),
        ));
    }
    Ok(())
}
