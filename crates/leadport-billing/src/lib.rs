//! Leadport Billing — Stripe checkout, webhook reconciliation and
//! lazily-expiring subscriptions.

pub mod config;
pub mod error;
pub mod gateway;
pub mod service;
pub mod subscription;
pub mod webhook;

pub use config::StripeConfig;
pub use error::{BillingError, StripeErrorKind};
pub use gateway::{CheckoutRequest, CheckoutSessionCreated, PaymentGateway, StripeGateway};
pub use service::{BillingService, NewPackage, WebhookOutcome};
