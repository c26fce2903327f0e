//! Password verification using Argon2id, plus registration input checks.

use argon2::{Argon2, PasswordVerifier};

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// If `pepper` is provided it is prepended to the password before
/// verification; it must match the pepper used during hashing.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    // Parameters come from the PHC string, not from `default()`.
    match Argon2::default().verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Enforce the configured length bounds, counted in characters.
pub fn check_password_policy(password: &str, config: &AuthConfig) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < config.min_password_length || len > config.max_password_length {
        return Err(AuthError::PasswordPolicy {
            min: config.min_password_length,
            max: config.max_password_length,
        });
    }
    Ok(())
}

/// Shallow shape check: one `@`, a non-empty local part, a dotted domain.
pub fn check_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidEmail);
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.') =>
        {
            Ok(())
        }
        _ => Err(AuthError::InvalidEmail),
    }
}
