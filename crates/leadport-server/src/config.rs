//! Server configuration, read from `LEADPORT_*` / `STRIPE_*` environment
//! variables with an optional `.env` file.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use leadport_auth::AuthConfig;
use leadport_auth::config::MAX_SESSION_LIFETIME_SECS;
use leadport_billing::StripeConfig;
use leadport_db::DbConfig;
use leadport_leads::LeadsConfig;
use thiserror::Error;

use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{var} must be set when {because} is set")]
    Missing {
        var: &'static str,
        because: &'static str,
    },
}

/// Tenant and administrator created at startup if absent.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub tenant_slug: String,
    pub tenant_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db: DbConfig,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    pub leads: LeadsConfig,
    pub rate_limit: RateLimitConfig,
    /// Mark the session cookie `Secure`; on whenever served over HTTPS.
    pub cookie_secure: bool,
    pub bootstrap: Option<BootstrapConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            db: DbConfig::default(),
            auth: AuthConfig::default(),
            stripe: StripeConfig::default(),
            leads: LeadsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cookie_secure: false,
            bootstrap: None,
        }
    }
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from any variable source. Unset variables keep
    /// their defaults; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("LEADPORT_BIND_ADDR") {
            config.bind_addr = parse("LEADPORT_BIND_ADDR", &addr)?;
        }

        if let Some(url) = get("LEADPORT_DB_URL") {
            config.db.url = url;
        }
        if let Some(ns) = get("LEADPORT_DB_NAMESPACE") {
            config.db.namespace = ns;
        }
        if let Some(db) = get("LEADPORT_DB_DATABASE") {
            config.db.database = db;
        }
        config.db.username = get("LEADPORT_DB_USER");
        config.db.password = get("LEADPORT_DB_PASSWORD");

        if let Some(ttl) = get("LEADPORT_SESSION_TTL_SECS") {
            let secs: u64 = parse("LEADPORT_SESSION_TTL_SECS", &ttl)?;
            if secs == 0 || secs > MAX_SESSION_LIFETIME_SECS {
                return Err(ConfigError::Invalid {
                    var: "LEADPORT_SESSION_TTL_SECS",
                    reason: format!("must be between 1 and {MAX_SESSION_LIFETIME_SECS}"),
                });
            }
            config.auth.session_lifetime_secs = secs;
        }
        config.auth.pepper = get("LEADPORT_PASSWORD_PEPPER");

        if let Some(secure) = get("LEADPORT_COOKIE_SECURE") {
            config.cookie_secure = parse_bool("LEADPORT_COOKIE_SECURE", &secure)?;
        }
        if let Some(enabled) = get("LEADPORT_RATE_LIMIT_ENABLED") {
            config.rate_limit.enabled = parse_bool("LEADPORT_RATE_LIMIT_ENABLED", &enabled)?;
        }

        if let Some(url) = get("LEADPORT_PUBLIC_URL") {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    var: "LEADPORT_PUBLIC_URL",
                    reason: "must start with http:// or https://".into(),
                });
            }
            config.stripe.public_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = get("STRIPE_SECRET_KEY") {
            config.stripe.secret_key = key;
        }
        if let Some(secret) = get("STRIPE_WEBHOOK_SECRET") {
            config.stripe.webhook_secret = secret;
        }
        if let Some(currency) = get("STRIPE_CURRENCY") {
            let currency = currency.trim().to_lowercase();
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_lowercase()) {
                return Err(ConfigError::Invalid {
                    var: "STRIPE_CURRENCY",
                    reason: format!("{currency:?} is not an ISO 4217 code"),
                });
            }
            config.stripe.currency = currency.clone();
            config.leads.currency = currency;
        }

        if let Some(slug) = get("LEADPORT_BOOTSTRAP_TENANT") {
            let admin_email = get("LEADPORT_BOOTSTRAP_ADMIN_EMAIL").ok_or(ConfigError::Missing {
                var: "LEADPORT_BOOTSTRAP_ADMIN_EMAIL",
                because: "LEADPORT_BOOTSTRAP_TENANT",
            })?;
            let admin_password =
                get("LEADPORT_BOOTSTRAP_ADMIN_PASSWORD").ok_or(ConfigError::Missing {
                    var: "LEADPORT_BOOTSTRAP_ADMIN_PASSWORD",
                    because: "LEADPORT_BOOTSTRAP_TENANT",
                })?;
            config.bootstrap = Some(BootstrapConfig {
                tenant_name: get("LEADPORT_BOOTSTRAP_TENANT_NAME").unwrap_or_else(|| slug.clone()),
                tenant_slug: slug,
                admin_email,
                admin_password,
            });
        }

        Ok(config)
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("{other:?} is not a boolean"),
        }),
    }
}
