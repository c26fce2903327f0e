//! Payment gateway abstraction and the Stripe Checkout implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::StripeConfig;
use crate::error::{BillingError, StripeErrorKind};

/// A one-off hosted checkout for a single line item.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub product_name: String,
    pub amount_cents: i64,
    pub currency: String,
    pub customer_email: Option<String>,
    /// Our own id for the thing being paid for.
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionCreated {
    #[serde(rename = "session_id", alias = "id")]
    pub id: String,
    pub url: String,
}

/// Creates hosted checkout sessions with a payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSessionCreated, BillingError>;
}

/// Stripe Checkout over the REST API (`POST /v1/checkout/sessions`).
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeSessionBody {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn form_fields(request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.cancel_url.clone()),
            ("client_reference_id".into(), request.client_reference_id.clone()),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "line_items[0][price_data][currency]".into(),
                request.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                request.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                request.product_name.clone(),
            ),
        ];
        if let Some(email) = &request.customer_email {
            fields.push(("customer_email".into(), email.clone()));
        }
        for (key, value) in &request.metadata {
            fields.push((format!("metadata[{key}]"), value.clone()));
        }
        fields
    }
}

/// Map a non-2xx Stripe response body to a classified error.
fn classify_error_body(status: u16, body: &str) -> BillingError {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => BillingError::Provider {
            kind: StripeErrorKind::from_type(&parsed.error.error_type),
            message: parsed
                .error
                .message
                .unwrap_or_else(|| format!("HTTP {status}")),
        },
        Err(_) => BillingError::Transport(format!("HTTP {status} with unreadable body")),
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSessionCreated, BillingError> {
        if self.config.secret_key.is_empty() {
            return Err(BillingError::NotConfigured);
        }

        let url = format!(
            "{}/v1/checkout/sessions",
            self.config.api_base.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(&Self::form_fields(&request))
            .send()
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        if !status.is_success() {
            let err = classify_error_body(status.as_u16(), &body);
            warn!(status = status.as_u16(), error = %err, "Stripe rejected checkout session");
            return Err(err);
        }

        let session: StripeSessionBody = serde_json::from_str(&body)
            .map_err(|e| BillingError::Transport(format!("unexpected checkout response: {e}")))?;
        let url = session
            .url
            .ok_or_else(|| BillingError::Transport("checkout session has no url".into()))?;

        debug!(session_id = %session.id, "Stripe checkout session created");
        Ok(CheckoutSessionCreated {
            id: session.id,
            url,
        })
    }
}
