//! Billing error types and Stripe error classification.

use leadport_core::error::LeadportError;
use thiserror::Error;

/// The `error.type` field of a Stripe API error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeErrorKind {
    Card,
    InvalidRequest,
    RateLimit,
    Authentication,
    Permission,
    Idempotency,
    Api,
}

impl StripeErrorKind {
    pub fn from_type(error_type: &str) -> Self {
        match error_type {
            "card_error" => Self::Card,
            "invalid_request_error" => Self::InvalidRequest,
            "rate_limit_error" => Self::RateLimit,
            "authentication_error" => Self::Authentication,
            "permission_error" => Self::Permission,
            "idempotency_error" => Self::Idempotency,
            _ => Self::Api,
        }
    }
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("missing Stripe-Signature header")]
    SignatureMissing,

    #[error("webhook signature verification failed")]
    SignatureInvalid,

    #[error("webhook timestamp outside tolerance")]
    SignatureExpired,

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("checkout session metadata missing {0}")]
    MissingMetadata(&'static str),

    #[error("checkout session metadata has invalid {field}: {value}")]
    InvalidMetadata { field: &'static str, value: String },

    /// Stripe answered with an error object.
    #[error("stripe {kind:?} error: {message}")]
    Provider {
        kind: StripeErrorKind,
        message: String,
    },

    /// The request never produced a usable Stripe response.
    #[error("payment provider unreachable: {0}")]
    Transport(String),

    #[error("payments are not configured")]
    NotConfigured,
}

impl From<BillingError> for LeadportError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::SignatureMissing
            | BillingError::SignatureInvalid
            | BillingError::SignatureExpired
            | BillingError::MalformedPayload(_)
            | BillingError::MissingMetadata(_)
            | BillingError::InvalidMetadata { .. } => LeadportError::Validation {
                message: err.to_string(),
            },
            BillingError::Provider { kind, message } => match kind {
                StripeErrorKind::Card => LeadportError::PaymentDeclined { reason: message },
                StripeErrorKind::InvalidRequest | StripeErrorKind::Idempotency => {
                    LeadportError::Validation {
                        message: format!("payment request rejected: {message}"),
                    }
                }
                StripeErrorKind::RateLimit => LeadportError::RateLimited,
                StripeErrorKind::Authentication | StripeErrorKind::Permission => {
                    LeadportError::Internal("payment configuration error".into())
                }
                StripeErrorKind::Api => LeadportError::PaymentProvider(message),
            },
            BillingError::Transport(msg) => LeadportError::PaymentProvider(msg),
            BillingError::NotConfigured => {
                LeadportError::Internal("payment configuration error".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(error_type: &str) -> LeadportError {
        BillingError::Provider {
            kind: StripeErrorKind::from_type(error_type),
            message: "Your card was declined.".into(),
        }
        .into()
    }

    #[test]
    fn card_errors_surface_stripe_message() {
        assert!(matches!(
            provider("card_error"),
            LeadportError::PaymentDeclined { reason } if reason == "Your card was declined."
        ));
    }

    #[test]
    fn provider_error_classification() {
        assert!(matches!(provider("invalid_request_error"), LeadportError::Validation { .. }));
        assert!(matches!(provider("rate_limit_error"), LeadportError::RateLimited));
        assert!(matches!(provider("authentication_error"), LeadportError::Internal(_)));
        assert!(matches!(provider("permission_error"), LeadportError::Internal(_)));
        assert!(matches!(provider("api_error"), LeadportError::PaymentProvider(_)));
        assert!(matches!(provider("something_new"), LeadportError::PaymentProvider(_)));
    }

    #[test]
    fn webhook_input_problems_are_client_errors() {
        let err: LeadportError = BillingError::MissingMetadata("kind").into();
        assert!(matches!(err, LeadportError::Validation { .. }));
        let err: LeadportError = BillingError::SignatureInvalid.into();
        assert!(matches!(err, LeadportError::Validation { .. }));
    }
}
