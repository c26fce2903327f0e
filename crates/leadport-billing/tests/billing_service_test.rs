//! Integration tests for checkout, webhook reconciliation and
//! subscriptions against in-memory SurrealDB and a fake gateway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use leadport_auth::AuthenticatedUser;
use leadport_billing::webhook::{Event, sign_payload};
use leadport_billing::{
    BillingError, BillingService, CheckoutRequest, CheckoutSessionCreated, NewPackage,
    PaymentGateway, StripeConfig, WebhookOutcome,
};
use leadport_core::error::{LeadportError, LeadportResult};
use leadport_core::models::invoice::{CreateInvoice, InvoiceStatus};
use leadport_core::models::lead::{CreateLead, Lead, LeadFilter, LeadStatus, UpdateLead};
use leadport_core::models::package::{CreatePackage, UpdatePackage};
use leadport_core::models::purchase::{CreatePurchase, PurchaseStatus};
use leadport_core::models::tenant::CreateTenant;
use leadport_core::models::user::{CreateUser, Role};
use leadport_core::repository::{
    InvoiceRepository, LeadRepository, PackageRepository, PaginatedResult, Pagination,
    PurchaseRepository, TenantRepository, UserRepository,
};
use leadport_db::repository::{
    SurrealInvoiceRepository, SurrealLeadRepository, SurrealPackageRepository,
    SurrealPurchaseRepository, SurrealTenantRepository, SurrealUserRepository,
};
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

const WEBHOOK_SECRET: &str = "whsec_test";

type Service = BillingService<
    SurrealInvoiceRepository<Db>,
    SurrealLeadRepository<Db>,
    SurrealPurchaseRepository<Db>,
    SurrealPackageRepository<Db>,
    SurrealUserRepository<Db>,
>;

/// Records every checkout request and hands back a predictable session.
#[derive(Default)]
struct FakeGateway {
    requests: Mutex<Vec<CheckoutRequest>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSessionCreated, BillingError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        let id = format!("cs_test_{}", requests.len());
        Ok(CheckoutSessionCreated {
            url: format!("https://checkout.stripe.test/{id}"),
            id,
        })
    }
}

/// Lead storage whose `Invoiced -> Paid` write keeps losing to another
/// writer until switched off.
struct FlakyLeads {
    inner: SurrealLeadRepository<Db>,
    contended: AtomicBool,
}

impl LeadRepository for FlakyLeads {
    async fn create(&self, input: CreateLead) -> LeadportResult<Lead> {
        self.inner.create(input).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<Lead> {
        self.inner.get_by_id(tenant_id, id).await
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: LeadFilter,
        pagination: Pagination,
    ) -> LeadportResult<PaginatedResult<Lead>> {
        self.inner.list(tenant_id, filter, pagination).await
    }

    async fn update_details(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateLead,
        expected: Option<LeadStatus>,
    ) -> LeadportResult<Option<Lead>> {
        self.inner
            .update_details(tenant_id, id, input, expected)
            .await
    }

    async fn delete_new(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<bool> {
        self.inner.delete_new(tenant_id, id).await
    }

    async fn assign(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<Option<Lead>> {
        self.inner.assign(tenant_id, id, user_id).await
    }

    async fn accept(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<Option<Lead>> {
        self.inner.accept(tenant_id, id, user_id).await
    }

    async fn decline(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<Option<Lead>> {
        self.inner.decline(tenant_id, id, user_id).await
    }

    async fn mark_invoiced(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        invoice_id: Uuid,
    ) -> LeadportResult<Option<Lead>> {
        self.inner.mark_invoiced(tenant_id, id, invoice_id).await
    }

    async fn mark_paid(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<Option<Lead>> {
        if self.contended.load(Ordering::SeqCst) {
            return Err(LeadportError::conflict("concurrent update of lead"));
        }
        self.inner.mark_paid(tenant_id, id).await
    }
}

fn stripe_config() -> StripeConfig {
    StripeConfig {
        secret_key: "sk_test".into(),
        webhook_secret: WEBHOOK_SECRET.into(),
        ..Default::default()
    }
}

struct Fixture {
    db: Surreal<Db>,
    svc: Arc<Service>,
    gateway: Arc<FakeGateway>,
    tenant_id: Uuid,
    buyer: AuthenticatedUser,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    leadport_db::run_migrations(&db).await.unwrap();

    let tenant = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "Acme Outbound".into(),
            slug: "acme".into(),
        })
        .await
        .unwrap();
    let user = SurrealUserRepository::new(db.clone())
        .create(CreateUser {
            tenant_id: tenant.id,
            email: "buyer@example.com".into(),
            name: "Buyer".into(),
            password: "correct-horse".into(),
            role: Role::User,
        })
        .await
        .unwrap();

    let gateway = Arc::new(FakeGateway::default());
    let svc = Arc::new(BillingService::new(
        SurrealInvoiceRepository::new(db.clone()),
        SurrealLeadRepository::new(db.clone()),
        SurrealPurchaseRepository::new(db.clone()),
        SurrealPackageRepository::new(db.clone()),
        SurrealUserRepository::new(db.clone()),
        gateway.clone(),
        stripe_config(),
    ));

    let buyer = AuthenticatedUser {
        user_id: user.id,
        tenant_id: tenant.id,
        session_id: Uuid::new_v4(),
        email: user.email,
        name: user.name,
        role: Role::User,
    };

    Fixture {
        db,
        svc,
        gateway,
        tenant_id: tenant.id,
        buyer,
    }
}

/// Drive a lead to INVOICED for `buyer` and return (lead_id, invoice_id).
async fn invoiced_lead(fx: &Fixture) -> (Uuid, Uuid) {
    let leads = SurrealLeadRepository::new(fx.db.clone());
    let lead = leads
        .create(CreateLead {
            tenant_id: fx.tenant_id,
            agent_id: Uuid::new_v4(),
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: Some("grace@example.com".into()),
            phone: None,
            company: None,
            job_title: None,
            notes: None,
        })
        .await
        .unwrap();
    leads
        .assign(fx.tenant_id, lead.id, fx.buyer.user_id)
        .await
        .unwrap()
        .unwrap();
    leads
        .accept(fx.tenant_id, lead.id, fx.buyer.user_id)
        .await
        .unwrap()
        .unwrap();

    let invoice = SurrealInvoiceRepository::new(fx.db.clone())
        .create(CreateInvoice {
            tenant_id: fx.tenant_id,
            lead_id: lead.id,
            user_id: fx.buyer.user_id,
            amount_cents: 25_000,
            currency: "usd".into(),
        })
        .await
        .unwrap();
    leads
        .mark_invoiced(fx.tenant_id, lead.id, invoice.id)
        .await
        .unwrap()
        .unwrap();

    (lead.id, invoice.id)
}

async fn package(fx: &Fixture, name: &str) -> Uuid {
    SurrealPackageRepository::new(fx.db.clone())
        .create(CreatePackage {
            tenant_id: fx.tenant_id,
            name: name.into(),
            description: "Lead access".into(),
            price_cents: 4_900,
            currency: "usd".into(),
            duration_days: 30,
        })
        .await
        .unwrap()
        .id
}

fn checkout_event(session_id: &str, metadata: serde_json::Value) -> Event {
    serde_json::from_value(json!({
        "id": format!("evt_{session_id}"),
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": session_id,
            "payment_status": "paid",
            "amount_total": 4900,
            "metadata": metadata,
        }}
    }))
    .unwrap()
}

fn package_metadata(fx: &Fixture, package_id: Uuid) -> serde_json::Value {
    json!({
        "kind": "package",
        "tenant_id": fx.tenant_id.to_string(),
        "package_id": package_id.to_string(),
        "user_id": fx.buyer.user_id.to_string(),
    })
}

// -----------------------------------------------------------------------
// Invoice reconciliation
// -----------------------------------------------------------------------

#[tokio::test]
async fn invoice_webhook_marks_invoice_and_lead_paid() {
    let fx = setup().await;
    let (lead_id, invoice_id) = invoiced_lead(&fx).await;

    let event = checkout_event(
        "cs_inv_1",
        json!({
            "kind": "invoice",
            "tenant_id": fx.tenant_id.to_string(),
            "invoice_id": invoice_id.to_string(),
        }),
    );
    let outcome = fx.svc.handle_event(&event).await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::InvoicePaid {
            invoice_id,
            lead_id
        }
    );

    let invoice = SurrealInvoiceRepository::new(fx.db.clone())
        .get_by_id(fx.tenant_id, invoice_id)
        .await
        .unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.stripe_session_id.as_deref(), Some("cs_inv_1"));

    let lead = SurrealLeadRepository::new(fx.db.clone())
        .get_by_id(fx.tenant_id, lead_id)
        .await
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Paid);

    // Redelivery is acknowledged without side effects.
    let again = fx.svc.handle_event(&event).await.unwrap();
    assert!(matches!(again, WebhookOutcome::AlreadyProcessed { .. }));
}

#[tokio::test]
async fn unknown_invoice_is_not_found() {
    let fx = setup().await;
    let event = checkout_event(
        "cs_inv_missing",
        json!({
            "kind": "invoice",
            "tenant_id": fx.tenant_id.to_string(),
            "invoice_id": Uuid::new_v4().to_string(),
        }),
    );
    let result = fx.svc.handle_event(&event).await;
    assert!(matches!(result, Err(LeadportError::NotFound { .. })));
}

#[tokio::test]
async fn redelivery_finishes_lead_of_already_paid_invoice() {
    let fx = setup().await;
    let (lead_id, invoice_id) = invoiced_lead(&fx).await;
    // The invoice was settled but the lead update never landed.
    SurrealInvoiceRepository::new(fx.db.clone())
        .mark_paid(fx.tenant_id, invoice_id, "cs_inv_partial")
        .await
        .unwrap()
        .unwrap();

    let event = checkout_event(
        "cs_inv_partial",
        json!({
            "kind": "invoice",
            "tenant_id": fx.tenant_id.to_string(),
            "invoice_id": invoice_id.to_string(),
        }),
    );
    let outcome = fx.svc.handle_event(&event).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::AlreadyProcessed { .. }));

    let lead = SurrealLeadRepository::new(fx.db.clone())
        .get_by_id(fx.tenant_id, lead_id)
        .await
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Paid);
}

#[tokio::test]
async fn lead_update_failure_after_charge_asks_for_redelivery() {
    let fx = setup().await;
    let (lead_id, invoice_id) = invoiced_lead(&fx).await;
    let flaky = BillingService::new(
        SurrealInvoiceRepository::new(fx.db.clone()),
        FlakyLeads {
            inner: SurrealLeadRepository::new(fx.db.clone()),
            contended: AtomicBool::new(true),
        },
        SurrealPurchaseRepository::new(fx.db.clone()),
        SurrealPackageRepository::new(fx.db.clone()),
        SurrealUserRepository::new(fx.db.clone()),
        fx.gateway.clone(),
        stripe_config(),
    );
    let event = checkout_event(
        "cs_inv_flaky",
        json!({
            "kind": "invoice",
            "tenant_id": fx.tenant_id.to_string(),
            "invoice_id": invoice_id.to_string(),
        }),
    );

    // Storage trouble after payment is a server fault, not a client conflict.
    let err = flaky.handle_event(&event).await.unwrap_err();
    assert!(matches!(err, LeadportError::Internal(_)), "got {err:?}");
    assert!(err.is_transient());

    let leads = SurrealLeadRepository::new(fx.db.clone());
    assert_eq!(
        leads.get_by_id(fx.tenant_id, lead_id).await.unwrap().status,
        LeadStatus::Invoiced
    );

    // Stripe redelivers and the lead catches up.
    let outcome = fx.svc.handle_event(&event).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::AlreadyProcessed { .. }));
    assert_eq!(
        leads.get_by_id(fx.tenant_id, lead_id).await.unwrap().status,
        LeadStatus::Paid
    );
}

// -----------------------------------------------------------------------
// Package reconciliation
// -----------------------------------------------------------------------

#[tokio::test]
async fn duplicate_webhook_creates_one_purchase() {
    let fx = setup().await;
    let package_id = package(&fx, "Basic").await;
    let event = checkout_event("cs_pkg_1", package_metadata(&fx, package_id));

    let first = fx.svc.handle_event(&event).await.unwrap();
    assert!(matches!(first, WebhookOutcome::PurchaseCreated { .. }));
    let second = fx.svc.handle_event(&event).await.unwrap();
    assert!(matches!(second, WebhookOutcome::AlreadyProcessed { .. }));

    let history = fx
        .svc
        .purchase_history(fx.tenant_id, fx.buyer.user_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].stripe_session_id, "cs_pkg_1");
}

/// Fire the same delivery from several tasks at once.
async fn deliver_concurrently(fx: &Fixture, event: &Event) -> Vec<LeadportResult<WebhookOutcome>> {
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let svc = fx.svc.clone();
            let event = event.clone();
            tokio::spawn(async move { svc.handle_event(&event).await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap());
    }
    outcomes
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_webhooks_create_one_purchase() {
    let fx = setup().await;
    let package_id = package(&fx, "Basic").await;
    let event = checkout_event("cs_pkg_race", package_metadata(&fx, package_id));

    let outcomes = deliver_concurrently(&fx, &event).await;
    let created = outcomes
        .iter()
        .filter(|r| matches!(r, Ok(WebhookOutcome::PurchaseCreated { .. })))
        .count();
    assert_eq!(created, 1, "got {outcomes:?}");
    // Every other delivery is acknowledged, never refused with a conflict.
    let acknowledged = outcomes
        .iter()
        .filter(|r| matches!(r, Ok(WebhookOutcome::AlreadyProcessed { .. })))
        .count();
    assert_eq!(acknowledged, outcomes.len() - 1, "got {outcomes:?}");

    let history = fx
        .svc
        .purchase_history(fx.tenant_id, fx.buyer.user_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, PurchaseStatus::Active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_invoice_webhooks_settle_once() {
    let fx = setup().await;
    let (lead_id, invoice_id) = invoiced_lead(&fx).await;
    let event = checkout_event(
        "cs_inv_race",
        json!({
            "kind": "invoice",
            "tenant_id": fx.tenant_id.to_string(),
            "invoice_id": invoice_id.to_string(),
        }),
    );

    let outcomes = deliver_concurrently(&fx, &event).await;
    let paid = outcomes
        .iter()
        .filter(|r| matches!(r, Ok(WebhookOutcome::InvoicePaid { .. })))
        .count();
    assert_eq!(paid, 1, "got {outcomes:?}");
    let acknowledged = outcomes
        .iter()
        .filter(|r| matches!(r, Ok(WebhookOutcome::AlreadyProcessed { .. })))
        .count();
    assert_eq!(acknowledged, outcomes.len() - 1, "got {outcomes:?}");

    let invoice = SurrealInvoiceRepository::new(fx.db.clone())
        .get_by_id(fx.tenant_id, invoice_id)
        .await
        .unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.stripe_session_id.as_deref(), Some("cs_inv_race"));
    let lead = SurrealLeadRepository::new(fx.db.clone())
        .get_by_id(fx.tenant_id, lead_id)
        .await
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Paid);
}

#[tokio::test]
async fn new_purchase_supersedes_active_one() {
    let fx = setup().await;
    let basic = package(&fx, "Basic").await;
    let pro = package(&fx, "Pro").await;

    fx.svc
        .handle_event(&checkout_event("cs_old", package_metadata(&fx, basic)))
        .await
        .unwrap();
    fx.svc
        .handle_event(&checkout_event("cs_new", package_metadata(&fx, pro)))
        .await
        .unwrap();

    let current = fx
        .svc
        .current_subscription(fx.tenant_id, fx.buyer.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.stripe_session_id, "cs_new");
    assert_eq!(current.package_id, pro);

    let history = fx
        .svc
        .purchase_history(fx.tenant_id, fx.buyer.user_id)
        .await
        .unwrap();
    let old = history
        .iter()
        .find(|p| p.stripe_session_id == "cs_old")
        .unwrap();
    assert_eq!(old.status, PurchaseStatus::Cancelled);
}

#[tokio::test]
async fn missing_metadata_is_a_client_error() {
    let fx = setup().await;
    let event = checkout_event("cs_bad", json!({"kind": "package"}));
    let result = fx.svc.handle_event(&event).await;
    assert!(matches!(result, Err(LeadportError::Validation { .. })));
}

#[tokio::test]
async fn unrelated_and_unpaid_events_are_ignored() {
    let fx = setup().await;

    let other: Event = serde_json::from_value(json!({
        "id": "evt_other",
        "type": "customer.created",
        "data": {"object": {}}
    }))
    .unwrap();
    assert!(matches!(
        fx.svc.handle_event(&other).await.unwrap(),
        WebhookOutcome::Ignored { .. }
    ));

    let unpaid: Event = serde_json::from_value(json!({
        "id": "evt_unpaid",
        "type": "checkout.session.completed",
        "data": {"object": {"id": "cs_unpaid", "payment_status": "unpaid", "metadata": {}}}
    }))
    .unwrap();
    assert!(matches!(
        fx.svc.handle_event(&unpaid).await.unwrap(),
        WebhookOutcome::Ignored { .. }
    ));
}

#[tokio::test]
async fn signed_delivery_is_verified() {
    let fx = setup().await;
    let package_id = package(&fx, "Basic").await;
    let payload = serde_json::to_vec(&json!({
        "id": "evt_signed",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_signed",
            "payment_status": "paid",
            "metadata": package_metadata(&fx, package_id),
        }}
    }))
    .unwrap();

    let good = sign_payload(&payload, WEBHOOK_SECRET, Utc::now().timestamp());
    let outcome = fx
        .svc
        .handle_webhook(&payload, Some(&good))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::PurchaseCreated { .. }));

    let forged = sign_payload(&payload, "whsec_wrong", Utc::now().timestamp());
    assert!(matches!(
        fx.svc.handle_webhook(&payload, Some(&forged)).await,
        Err(LeadportError::Validation { .. })
    ));
    assert!(matches!(
        fx.svc.handle_webhook(&payload, None).await,
        Err(LeadportError::Validation { .. })
    ));
}

// -----------------------------------------------------------------------
// Checkout
// -----------------------------------------------------------------------

#[tokio::test]
async fn invoice_checkout_carries_metadata() {
    let fx = setup().await;
    let (_, invoice_id) = invoiced_lead(&fx).await;

    let session = fx
        .svc
        .start_invoice_checkout(&fx.buyer, invoice_id)
        .await
        .unwrap();
    assert_eq!(session.id, "cs_test_1");

    let requests = fx.gateway.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.amount_cents, 25_000);
    assert_eq!(request.product_name, "Lead: Grace Hopper");
    assert!(request.metadata.contains(&("kind", "invoice".to_string())));
    assert!(
        request
            .metadata
            .contains(&("invoice_id", invoice_id.to_string()))
    );
}

#[tokio::test]
async fn cannot_check_out_someone_elses_invoice() {
    let fx = setup().await;
    let (_, invoice_id) = invoiced_lead(&fx).await;
    let stranger = AuthenticatedUser {
        user_id: Uuid::new_v4(),
        ..fx.buyer.clone()
    };

    let result = fx.svc.start_invoice_checkout(&stranger, invoice_id).await;
    assert!(matches!(result, Err(LeadportError::NotFound { .. })));
}

#[tokio::test]
async fn subscribed_user_cannot_buy_another_package() {
    let fx = setup().await;
    let package_id = package(&fx, "Basic").await;

    fx.svc
        .start_package_checkout(&fx.buyer, package_id)
        .await
        .unwrap();
    fx.svc
        .handle_event(&checkout_event("cs_pkg", package_metadata(&fx, package_id)))
        .await
        .unwrap();

    let result = fx.svc.start_package_checkout(&fx.buyer, package_id).await;
    assert!(matches!(result, Err(LeadportError::Conflict { .. })));
}

#[tokio::test]
async fn agents_cannot_check_out() {
    let fx = setup().await;
    let package_id = package(&fx, "Basic").await;
    let agent = AuthenticatedUser {
        role: Role::Agent,
        ..fx.buyer.clone()
    };
    let result = fx.svc.start_package_checkout(&agent, package_id).await;
    assert!(matches!(result, Err(LeadportError::AuthorizationDenied { .. })));
}

// -----------------------------------------------------------------------
// Subscriptions
// -----------------------------------------------------------------------

#[tokio::test]
async fn lapsed_purchase_expires_on_read() {
    let fx = setup().await;
    let purchases = SurrealPurchaseRepository::new(fx.db.clone());
    let lapsed = purchases
        .create(CreatePurchase {
            tenant_id: fx.tenant_id,
            user_id: fx.buyer.user_id,
            package_id: Uuid::new_v4(),
            amount_cents: 4_900,
            expires_at: Utc::now() - Duration::minutes(5),
            stripe_session_id: "cs_lapsed".into(),
        })
        .await
        .unwrap();

    assert!(
        !fx.svc
            .has_active_subscription(fx.tenant_id, fx.buyer.user_id)
            .await
            .unwrap()
    );

    let stored = purchases.get_by_id(fx.tenant_id, lapsed.id).await.unwrap();
    assert_eq!(stored.status, PurchaseStatus::Expired);
}

#[tokio::test]
async fn cancel_subscription() {
    let fx = setup().await;
    let package_id = package(&fx, "Basic").await;
    fx.svc
        .handle_event(&checkout_event("cs_cancel", package_metadata(&fx, package_id)))
        .await
        .unwrap();

    let cancelled = fx.svc.cancel_subscription(&fx.buyer).await.unwrap();
    assert_eq!(cancelled.status, PurchaseStatus::Cancelled);

    let again = fx.svc.cancel_subscription(&fx.buyer).await;
    assert!(matches!(again, Err(LeadportError::NotFound { .. })));
}

// -----------------------------------------------------------------------
// Package administration
// -----------------------------------------------------------------------

#[tokio::test]
async fn admin_manages_packages() {
    let fx = setup().await;
    let admin = AuthenticatedUser {
        role: Role::Admin,
        ..fx.buyer.clone()
    };

    let package = fx
        .svc
        .create_package(
            &admin,
            NewPackage {
                name: " Starter ".into(),
                description: "Ten leads a month".into(),
                price_cents: 2_900,
                duration_days: 30,
                currency: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(package.name, "Starter");
    assert_eq!(package.currency, "usd");
    assert!(package.active);

    fx.svc
        .update_package(
            &admin,
            package.id,
            UpdatePackage {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let visible = fx.svc.list_packages(fx.tenant_id, true).await.unwrap();
    assert!(visible.is_empty());

    // Retired packages cannot be bought.
    let result = fx.svc.start_package_checkout(&fx.buyer, package.id).await;
    assert!(matches!(result, Err(LeadportError::Validation { .. })));
}

#[tokio::test]
async fn package_terms_are_validated() {
    let fx = setup().await;
    let admin = AuthenticatedUser {
        role: Role::Admin,
        ..fx.buyer.clone()
    };
    let input = |price_cents, duration_days| NewPackage {
        name: "Pro".into(),
        description: String::new(),
        price_cents,
        duration_days,
        currency: None,
    };

    for (price, days) in [(0, 30), (4_900, 0)] {
        assert!(matches!(
            fx.svc.create_package(&admin, input(price, days)).await,
            Err(LeadportError::Validation { .. })
        ));
    }
    assert!(matches!(
        fx.svc.create_package(&fx.buyer, input(4_900, 30)).await,
        Err(LeadportError::AuthorizationDenied { .. })
    ));
}
