//! Billing service — checkout, webhook reconciliation and subscriptions.
//!
//! Webhook delivery is at-least-once. Every branch first looks for a
//! record already keyed by the checkout session id. A unique index
//! violation or write conflict is resolved by re-reading that record:
//! if it exists a concurrent delivery won, otherwise the delivery fails
//! and is retried. Client faults (bad metadata, unknown ids) map to 4xx
//! so Stripe stops retrying; storage failures after a successful charge
//! map to 5xx so it keeps retrying.

use std::sync::Arc;

use chrono::{Duration, Utc};
use leadport_auth::AuthenticatedUser;
use leadport_core::error::{LeadportError, LeadportResult};
use leadport_core::models::invoice::InvoiceStatus;
use leadport_core::models::package::{CreatePackage, Package, UpdatePackage};
use leadport_core::models::purchase::{CreatePurchase, Purchase, PurchaseStatus};
use leadport_core::repository::{
    InvoiceRepository, LeadRepository, PackageRepository, PurchaseRepository, UserRepository,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::StripeConfig;
use crate::error::BillingError;
use crate::gateway::{CheckoutRequest, CheckoutSessionCreated, PaymentGateway};
use crate::subscription;
use crate::webhook::{self, CheckoutPurpose, CheckoutSession, Event};

/// What a webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    InvoicePaid { invoice_id: Uuid, lead_id: Uuid },
    PurchaseCreated { purchase_id: Uuid, user_id: Uuid },
    AlreadyProcessed { session_id: String },
    Ignored { reason: String },
}

/// Admin input for a new package; the currency defaults to the
/// configured one.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPackage {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    pub duration_days: u32,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Billing service.
///
/// Generic over repository implementations; the payment provider is a
/// trait object so tests can swap in a fake.
pub struct BillingService<I, L, P, K, U>
where
    I: InvoiceRepository,
    L: LeadRepository,
    P: PurchaseRepository,
    K: PackageRepository,
    U: UserRepository,
{
    invoices: I,
    leads: L,
    purchases: P,
    packages: K,
    users: U,
    gateway: Arc<dyn PaymentGateway>,
    config: StripeConfig,
}

impl<I, L, P, K, U> BillingService<I, L, P, K, U>
where
    I: InvoiceRepository,
    L: LeadRepository,
    P: PurchaseRepository,
    K: PackageRepository,
    U: UserRepository,
{
    pub fn new(
        invoices: I,
        leads: L,
        purchases: P,
        packages: K,
        users: U,
        gateway: Arc<dyn PaymentGateway>,
        config: StripeConfig,
    ) -> Self {
        Self {
            invoices,
            leads,
            purchases,
            packages,
            users,
            gateway,
            config,
        }
    }

    // -------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------

    /// Open a hosted checkout for one of the caller's unpaid invoices.
    pub async fn start_invoice_checkout(
        &self,
        actor: &AuthenticatedUser,
        invoice_id: Uuid,
    ) -> LeadportResult<CheckoutSessionCreated> {
        actor.require_user()?;

        let invoice = self.invoices.get_by_id(actor.tenant_id, invoice_id).await?;
        if invoice.user_id != actor.user_id {
            return Err(LeadportError::not_found("invoice", invoice_id));
        }
        if invoice.status == InvoiceStatus::Paid {
            return Err(LeadportError::conflict("invoice is already paid"));
        }

        let lead = self.leads.get_by_id(actor.tenant_id, invoice.lead_id).await?;
        let purpose = CheckoutPurpose::Invoice {
            tenant_id: actor.tenant_id,
            invoice_id,
        };

        let session = self
            .gateway
            .create_checkout_session(CheckoutRequest {
                product_name: format!("Lead: {} {}", lead.first_name, lead.last_name),
                amount_cents: invoice.amount_cents,
                currency: invoice.currency.clone(),
                customer_email: Some(actor.email.clone()),
                client_reference_id: invoice_id.to_string(),
                success_url: self.config.success_url(),
                cancel_url: self.config.cancel_url(),
                metadata: purpose.metadata(),
            })
            .await?;

        info!(
            tenant_id = %actor.tenant_id,
            invoice_id = %invoice_id,
            session_id = %session.id,
            "Invoice checkout started"
        );
        Ok(session)
    }

    /// Open a hosted checkout for a subscription package.
    pub async fn start_package_checkout(
        &self,
        actor: &AuthenticatedUser,
        package_id: Uuid,
    ) -> LeadportResult<CheckoutSessionCreated> {
        actor.require_user()?;

        let package = self.packages.get_by_id(actor.tenant_id, package_id).await?;
        if !package.active {
            return Err(LeadportError::validation("package is not available"));
        }
        if self
            .has_active_subscription(actor.tenant_id, actor.user_id)
            .await?
        {
            return Err(LeadportError::conflict(
                "an active subscription already exists",
            ));
        }

        let purpose = CheckoutPurpose::Package {
            tenant_id: actor.tenant_id,
            package_id,
            user_id: actor.user_id,
        };

        let session = self
            .gateway
            .create_checkout_session(CheckoutRequest {
                product_name: package.name.clone(),
                amount_cents: package.price_cents,
                currency: package.currency.clone(),
                customer_email: Some(actor.email.clone()),
                client_reference_id: package_id.to_string(),
                success_url: self.config.success_url(),
                cancel_url: self.config.cancel_url(),
                metadata: purpose.metadata(),
            })
            .await?;

        info!(
            tenant_id = %actor.tenant_id,
            user_id = %actor.user_id,
            package_id = %package_id,
            session_id = %session.id,
            "Package checkout started"
        );
        Ok(session)
    }

    // -------------------------------------------------------------------
    // Webhooks
    // -------------------------------------------------------------------

    /// Verify a raw webhook delivery and reconcile it.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> LeadportResult<WebhookOutcome> {
        if self.config.webhook_secret.is_empty() {
            return Err(BillingError::NotConfigured.into());
        }
        let header = signature_header.ok_or(BillingError::SignatureMissing)?;
        webhook::verify_signature(
            payload,
            header,
            &self.config.webhook_secret,
            self.config.signature_tolerance_secs,
            Utc::now().timestamp(),
        )
        .inspect_err(|e| warn!(error = %e, "Webhook signature rejected"))?;

        let event = webhook::parse_event(payload)?;
        self.handle_event(&event).await
    }

    /// Reconcile an already-verified event.
    pub async fn handle_event(&self, event: &Event) -> LeadportResult<WebhookOutcome> {
        if !event.is_checkout_paid_event() {
            info!(event_id = %event.id, event_type = %event.event_type, "Webhook event ignored");
            return Ok(WebhookOutcome::Ignored {
                reason: format!("unhandled event type {}", event.event_type),
            });
        }

        let session = CheckoutSession::from_event(event)?;
        if !session.is_paid() {
            info!(
                event_id = %event.id,
                session_id = %session.id,
                payment_status = ?session.payment_status,
                "Checkout session not paid yet"
            );
            return Ok(WebhookOutcome::Ignored {
                reason: "payment not completed".into(),
            });
        }

        match CheckoutPurpose::from_metadata(&session.metadata)? {
            CheckoutPurpose::Invoice {
                tenant_id,
                invoice_id,
            } => self.settle_invoice(&session, tenant_id, invoice_id).await,
            CheckoutPurpose::Package {
                tenant_id,
                package_id,
                user_id,
            } => {
                self.record_purchase(&session, tenant_id, package_id, user_id)
                    .await
            }
        }
    }

    async fn settle_invoice(
        &self,
        session: &CheckoutSession,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> LeadportResult<WebhookOutcome> {
        if let Some(existing) = self.invoices.get_by_stripe_session(&session.id).await? {
            // A retry after a failed lead update must still finish the lead.
            self.finish_lead(existing.tenant_id, existing.lead_id).await?;
            info!(session_id = %session.id, invoice_id = %existing.id, "Invoice webhook already processed");
            return Ok(already_processed(session));
        }

        let invoice = self.invoices.get_by_id(tenant_id, invoice_id).await?;
        if invoice.status == InvoiceStatus::Paid {
            self.finish_lead(tenant_id, invoice.lead_id).await?;
            info!(session_id = %session.id, invoice_id = %invoice_id, "Invoice already paid");
            return Ok(already_processed(session));
        }

        let mut attempt = 1;
        let settled = loop {
            match self
                .invoices
                .mark_paid(tenant_id, invoice_id, &session.id)
                .await
            {
                Ok(found) => break found.is_some(),
                Err(LeadportError::Conflict { .. }) if attempt < CONFLICT_ATTEMPTS => attempt += 1,
                Err(LeadportError::Conflict { .. } | LeadportError::AlreadyExists { .. }) => {
                    break false;
                }
                Err(e) => return Err(e),
            }
        };
        if !settled {
            return self.invoice_settled_elsewhere(session, tenant_id, invoice_id).await;
        }

        self.finish_lead(tenant_id, invoice.lead_id).await?;

        info!(
            tenant_id = %tenant_id,
            invoice_id = %invoice_id,
            lead_id = %invoice.lead_id,
            session_id = %session.id,
            "Invoice paid"
        );
        Ok(WebhookOutcome::InvoicePaid {
            invoice_id,
            lead_id: invoice.lead_id,
        })
    }

    /// The guarded update lost to another writer. Acknowledge only once
    /// the invoice is verifiably paid; anything else asks for redelivery.
    async fn invoice_settled_elsewhere(
        &self,
        session: &CheckoutSession,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> LeadportResult<WebhookOutcome> {
        let invoice = match self.invoices.get_by_stripe_session(&session.id).await? {
            Some(invoice) => invoice,
            None => self.invoices.get_by_id(tenant_id, invoice_id).await?,
        };
        if invoice.status != InvoiceStatus::Paid {
            warn!(session_id = %session.id, invoice_id = %invoice_id, "Invoice settlement interrupted");
            return Err(LeadportError::Internal(format!(
                "invoice {invoice_id} not settled for session {}",
                session.id
            )));
        }

        self.finish_lead(invoice.tenant_id, invoice.lead_id).await?;
        info!(session_id = %session.id, invoice_id = %invoice_id, "Concurrent delivery settled invoice");
        Ok(already_processed(session))
    }

    /// `Invoiced -> Paid` for the lead; a no-op if it already moved.
    ///
    /// Runs after the charge, so an unresolved write conflict surfaces as
    /// an internal error and the provider redelivers.
    async fn finish_lead(&self, tenant_id: Uuid, lead_id: Uuid) -> LeadportResult<()> {
        let mut attempt = 1;
        loop {
            match self.leads.mark_paid(tenant_id, lead_id).await {
                Ok(Some(_)) => {
                    info!(tenant_id = %tenant_id, lead_id = %lead_id, "Lead paid");
                    return Ok(());
                }
                Ok(None) => return Ok(()),
                Err(LeadportError::Conflict { .. }) if attempt < CONFLICT_ATTEMPTS => attempt += 1,
                Err(e) => return Err(after_charge(e)),
            }
        }
    }

    async fn record_purchase(
        &self,
        session: &CheckoutSession,
        tenant_id: Uuid,
        package_id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<WebhookOutcome> {
        if let Some(existing) = self.purchases.get_by_stripe_session(&session.id).await? {
            self.supersede_others(&existing).await?;
            info!(session_id = %session.id, "Package webhook already processed");
            return Ok(already_processed(session));
        }

        let package = self.packages.get_by_id(tenant_id, package_id).await?;
        let user = self.users.get_by_id(tenant_id, user_id).await?;

        let mut attempt = 1;
        let purchase = loop {
            let created = self
                .purchases
                .create(CreatePurchase {
                    tenant_id,
                    user_id: user.id,
                    package_id,
                    amount_cents: session.amount_total.unwrap_or(package.price_cents),
                    expires_at: Utc::now() + Duration::days(i64::from(package.duration_days)),
                    stripe_session_id: session.id.clone(),
                })
                .await;
            match created {
                Ok(purchase) => break purchase,
                Err(
                    e @ (LeadportError::Conflict { .. } | LeadportError::AlreadyExists { .. }),
                ) => {
                    if self
                        .purchases
                        .get_by_stripe_session(&session.id)
                        .await?
                        .is_some()
                    {
                        info!(session_id = %session.id, "Concurrent delivery created purchase");
                        return Ok(already_processed(session));
                    }
                    if attempt >= CONFLICT_ATTEMPTS {
                        warn!(session_id = %session.id, error = %e, "Purchase not recorded");
                        return Err(after_charge(e));
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        self.supersede_others(&purchase).await?;

        info!(
            tenant_id = %tenant_id,
            user_id = %user_id,
            package_id = %package_id,
            purchase_id = %purchase.id,
            expires_at = %purchase.expires_at,
            "Subscription purchased"
        );
        Ok(WebhookOutcome::PurchaseCreated {
            purchase_id: purchase.id,
            user_id,
        })
    }

    /// Keep at most one active purchase per user: the newest wins.
    async fn supersede_others(&self, newest: &Purchase) -> LeadportResult<()> {
        let history = self
            .purchases
            .list_by_user(newest.tenant_id, newest.user_id)
            .await?;
        for old in history
            .iter()
            .filter(|p| p.id != newest.id && p.status == PurchaseStatus::Active)
        {
            match self.purchases.cancel(old.tenant_id, old.id).await {
                Ok(Some(_)) => {
                    info!(purchase_id = %old.id, superseded_by = %newest.id, "Purchase superseded");
                }
                Ok(None) => {}
                // Another delivery is cancelling the same row.
                Err(LeadportError::Conflict { .. }) => {}
                Err(e) => return Err(after_charge(e)),
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Packages
    // -------------------------------------------------------------------

    pub async fn list_packages(
        &self,
        tenant_id: Uuid,
        active_only: bool,
    ) -> LeadportResult<Vec<Package>> {
        self.packages.list(tenant_id, active_only).await
    }

    pub async fn create_package(
        &self,
        actor: &AuthenticatedUser,
        input: NewPackage,
    ) -> LeadportResult<Package> {
        actor.require_admin()?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(LeadportError::validation("package name is required"));
        }
        check_package_terms(Some(input.price_cents), Some(input.duration_days))?;

        let package = self
            .packages
            .create(CreatePackage {
                tenant_id: actor.tenant_id,
                name: name.to_string(),
                description: input.description.trim().to_string(),
                price_cents: input.price_cents,
                currency: input
                    .currency
                    .unwrap_or_else(|| self.config.currency.clone()),
                duration_days: input.duration_days,
            })
            .await?;

        info!(tenant_id = %actor.tenant_id, package_id = %package.id, "Package created");
        Ok(package)
    }

    /// Edit a package. Existing purchases keep the terms they were
    /// bought with.
    pub async fn update_package(
        &self,
        actor: &AuthenticatedUser,
        package_id: Uuid,
        input: UpdatePackage,
    ) -> LeadportResult<Package> {
        actor.require_admin()?;
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(LeadportError::validation("package name is required"));
        }
        check_package_terms(input.price_cents, input.duration_days)?;

        let package = self
            .packages
            .update(actor.tenant_id, package_id, input)
            .await?;
        info!(
            tenant_id = %actor.tenant_id,
            package_id = %package.id,
            active = package.active,
            "Package updated"
        );
        Ok(package)
    }

    // -------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------

    pub async fn current_subscription(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<Option<Purchase>> {
        subscription::current_subscription(&self.purchases, tenant_id, user_id, Utc::now()).await
    }

    pub async fn has_active_subscription(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<bool> {
        Ok(self.current_subscription(tenant_id, user_id).await?.is_some())
    }

    pub async fn cancel_subscription(&self, actor: &AuthenticatedUser) -> LeadportResult<Purchase> {
        actor.require_user()?;

        let current = self
            .current_subscription(actor.tenant_id, actor.user_id)
            .await?
            .ok_or_else(|| LeadportError::not_found("subscription", actor.user_id))?;

        let cancelled = self
            .purchases
            .cancel(actor.tenant_id, current.id)
            .await?
            .ok_or_else(|| LeadportError::conflict("subscription is no longer active"))?;

        info!(tenant_id = %actor.tenant_id, user_id = %actor.user_id, purchase_id = %cancelled.id, "Subscription cancelled");
        Ok(cancelled)
    }

    pub async fn purchase_history(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<Vec<Purchase>> {
        let history = self.purchases.list_by_user(tenant_id, user_id).await?;
        subscription::expire_lapsed(&self.purchases, history, Utc::now()).await
    }
}

fn check_package_terms(price_cents: Option<i64>, duration_days: Option<u32>) -> LeadportResult<()> {
    if price_cents.is_some_and(|p| p <= 0) {
        return Err(LeadportError::validation("price must be positive"));
    }
    if duration_days.is_some_and(|d| d == 0 || d > 3_650) {
        return Err(LeadportError::validation(
            "duration must be between 1 and 3650 days",
        ));
    }
    Ok(())
}

/// Write conflicts retried before a webhook gives up and asks for redelivery.
const CONFLICT_ATTEMPTS: u32 = 5;

fn already_processed(session: &CheckoutSession) -> WebhookOutcome {
    WebhookOutcome::AlreadyProcessed {
        session_id: session.id.clone(),
    }
}

/// Once the customer has been charged, a 4xx would stop Stripe from
/// retrying. Contention is reported as a server fault instead.
fn after_charge(error: LeadportError) -> LeadportError {
    match error {
        LeadportError::Conflict { reason } => {
            LeadportError::Internal(format!("webhook interrupted: {reason}"))
        }
        LeadportError::AlreadyExists { .. } => {
            LeadportError::Internal(format!("webhook interrupted: {error}"))
        }
        other => other,
    }
}
