//! Authentication configuration.

/// Longest session lifetime accepted from configuration: one year.
pub const MAX_SESSION_LIFETIME_SECS: u64 = 31_536_000;

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session lifetime in seconds (default: 604_800 = 7 days).
    pub session_lifetime_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id verification.
    pub pepper: Option<String>,
    /// Minimum password length for policy enforcement.
    pub min_password_length: usize,
    /// Upper bound on password length, keeps hashing cost bounded.
    pub max_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_lifetime_secs: 604_800,
            pepper: None,
            min_password_length: 8,
            max_password_length: 256,
        }
    }
}
