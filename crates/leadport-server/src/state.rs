//! Shared application state: the services, wired to SurrealDB.

use std::sync::Arc;

use leadport_auth::AuthService;
use leadport_billing::{BillingService, PaymentGateway};
use leadport_db::repository::{
    SurrealInvoiceRepository, SurrealLeadRepository, SurrealPackageRepository,
    SurrealPurchaseRepository, SurrealSessionRepository, SurrealTenantRepository,
    SurrealUserRepository,
};
use leadport_leads::LeadService;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

pub type Auth = AuthService<
    SurrealTenantRepository<Any>,
    SurrealUserRepository<Any>,
    SurrealSessionRepository<Any>,
>;

pub type Leads = LeadService<
    SurrealLeadRepository<Any>,
    SurrealInvoiceRepository<Any>,
    SurrealUserRepository<Any>,
    SurrealPurchaseRepository<Any>,
>;

pub type Billing = BillingService<
    SurrealInvoiceRepository<Any>,
    SurrealLeadRepository<Any>,
    SurrealPurchaseRepository<Any>,
    SurrealPackageRepository<Any>,
    SurrealUserRepository<Any>,
>;

/// Session cookie attributes.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age_secs: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Auth>,
    pub leads: Arc<Leads>,
    pub billing: Arc<Billing>,
    pub rate_limiter: Arc<RateLimiter>,
    pub cookie: CookieSettings,
}

impl AppState {
    pub fn new(db: Surreal<Any>, config: &ServerConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        let users = || match &config.auth.pepper {
            Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper.clone()),
            None => SurrealUserRepository::new(db.clone()),
        };

        let auth = AuthService::new(
            SurrealTenantRepository::new(db.clone()),
            users(),
            SurrealSessionRepository::new(db.clone()),
            config.auth.clone(),
        );
        let leads = LeadService::new(
            SurrealLeadRepository::new(db.clone()),
            SurrealInvoiceRepository::new(db.clone()),
            users(),
            SurrealPurchaseRepository::new(db.clone()),
            config.leads.clone(),
        );
        let billing = BillingService::new(
            SurrealInvoiceRepository::new(db.clone()),
            SurrealLeadRepository::new(db.clone()),
            SurrealPurchaseRepository::new(db.clone()),
            SurrealPackageRepository::new(db.clone()),
            users(),
            gateway,
            config.stripe.clone(),
        );

        Self {
            auth: Arc::new(auth),
            leads: Arc::new(leads),
            billing: Arc::new(billing),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            cookie: CookieSettings {
                secure: config.cookie_secure,
                max_age_secs: config.auth.session_lifetime_secs,
            },
        }
    }
}
