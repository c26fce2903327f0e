//! Authentication error types.

use leadport_core::error::LeadportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("session has expired")]
    SessionExpired,

    #[error("not signed in")]
    SessionInvalid,

    #[error("{0} role required")]
    RoleRequired(&'static str),

    #[error("password must be between {min} and {max} characters")]
    PasswordPolicy { min: usize, max: usize },

    #[error("invalid email address")]
    InvalidEmail,

    #[error("role {0} cannot be self-registered")]
    RoleNotRegistrable(&'static str),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for LeadportError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountDisabled
            | AuthError::SessionExpired
            | AuthError::SessionInvalid => LeadportError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::RoleRequired(_) => LeadportError::AuthorizationDenied {
                reason: err.to_string(),
            },
            AuthError::PasswordPolicy { .. }
            | AuthError::InvalidEmail
            | AuthError::RoleNotRegistrable(_) => LeadportError::Validation {
                message: err.to_string(),
            },
            AuthError::Crypto(msg) => LeadportError::Crypto(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_are_authentication_errors() {
        let err: LeadportError = AuthError::InvalidCredentials.into();
        assert!(matches!(err, LeadportError::AuthenticationFailed { .. }));
    }

    #[test]
    fn missing_role_is_authorization_error() {
        let err: LeadportError = AuthError::RoleRequired("admin").into();
        assert!(
            matches!(err, LeadportError::AuthorizationDenied { reason } if reason == "admin role required")
        );
    }
}
