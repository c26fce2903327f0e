//! Error types for the Leadport system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeadportError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    /// A guarded state transition matched no rows, or lost a write race.
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Payment declined: {reason}")]
    PaymentDeclined { reason: String },

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LeadportError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request later could succeed.
    ///
    /// Storage and provider failures are transient; everything else is a
    /// property of the request itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::PaymentProvider(_) | Self::Internal(_) | Self::RateLimited
        )
    }
}

pub type LeadportResult<T> = Result<T, LeadportError>;
