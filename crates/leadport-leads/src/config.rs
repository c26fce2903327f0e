/// Lead service configuration.
#[derive(Debug, Clone)]
pub struct LeadsConfig {
    /// ISO currency code stamped on new invoices.
    pub currency: String,
}

impl Default for LeadsConfig {
    fn default() -> Self {
        Self {
            currency: "usd".into(),
        }
    }
}
