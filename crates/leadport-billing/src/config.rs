//! Stripe configuration.

/// Configuration for the payment provider.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_live_...` / `sk_test_...`).
    pub secret_key: String,
    /// Webhook endpoint signing secret (`whsec_...`).
    pub webhook_secret: String,
    /// API base URL; overridden in tests.
    pub api_base: String,
    /// ISO currency used for invoices, lower-case.
    pub currency: String,
    /// Externally reachable origin used to build checkout return URLs.
    pub public_url: String,
    /// Maximum age of a webhook signature timestamp, in seconds.
    pub signature_tolerance_secs: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            api_base: "https://api.stripe.com".into(),
            currency: "usd".into(),
            public_url: "http://localhost:3000".into(),
            signature_tolerance_secs: 300,
        }
    }
}

impl StripeConfig {
    pub fn success_url(&self) -> String {
        format!(
            "{}/billing/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.public_url.trim_end_matches('/')
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/billing/cancel", self.public_url.trim_end_matches('/'))
    }
}
