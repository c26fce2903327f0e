//! Integration tests for the Lead repository's guarded transitions.

use leadport_core::error::LeadportError;
use leadport_core::models::lead::{CreateLead, LeadFilter, LeadStatus, UpdateLead};
use leadport_core::models::tenant::CreateTenant;
use leadport_core::repository::{LeadRepository, Pagination, TenantRepository};
use leadport_db::repository::{SurrealLeadRepository, SurrealTenantRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (SurrealLeadRepository<Db>, Uuid) {
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

    (SurrealLeadRepository::new(db), tenant.id)
}

fn new_lead(tenant_id: Uuid, agent_id: Uuid) -> CreateLead {
    CreateLead {
        tenant_id,
        agent_id,
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        email: Some("grace@navy.example".into()),
        phone: None,
        company: Some("US Navy".into()),
        job_title: None,
        notes: None,
    }
}

#[tokio::test]
async fn create_starts_new_and_unassigned() {
    let (repo, tenant_id) = setup().await;
    let agent = Uuid::new_v4();

    let lead = repo.create(new_lead(tenant_id, agent)).await.unwrap();
    assert_eq!(lead.status, LeadStatus::New);
    assert_eq!(lead.agent_id, agent);
    assert!(lead.assigned_user_id.is_none());
    assert!(lead.invoice_id.is_none());

    let fetched = repo.get_by_id(tenant_id, lead.id).await.unwrap();
    assert_eq!(fetched.email.as_deref(), Some("grace@navy.example"));
    assert_eq!(fetched.phone, None);
}

#[tokio::test]
async fn full_lifecycle_to_paid() {
    let (repo, tenant_id) = setup().await;
    let user = Uuid::new_v4();
    let invoice = Uuid::new_v4();
    let lead = repo.create(new_lead(tenant_id, Uuid::new_v4())).await.unwrap();

    let pending = repo.assign(tenant_id, lead.id, user).await.unwrap().unwrap();
    assert_eq!(pending.status, LeadStatus::Pending);
    assert_eq!(pending.assigned_user_id, Some(user));

    let accepted = repo.accept(tenant_id, lead.id, user).await.unwrap().unwrap();
    assert_eq!(accepted.status, LeadStatus::Accepted);

    let invoiced = repo
        .mark_invoiced(tenant_id, lead.id, invoice)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoiced.status, LeadStatus::Invoiced);
    assert_eq!(invoiced.invoice_id, Some(invoice));

    let paid = repo.mark_paid(tenant_id, lead.id).await.unwrap().unwrap();
    assert_eq!(paid.status, LeadStatus::Paid);

    // Terminal: no transition matches any more.
    assert!(repo.mark_paid(tenant_id, lead.id).await.unwrap().is_none());
    assert!(repo.assign(tenant_id, lead.id, user).await.unwrap().is_none());
}

#[tokio::test]
async fn decline_clears_assignment_and_returns_to_new() {
    let (repo, tenant_id) = setup().await;
    let user = Uuid::new_v4();
    let lead = repo.create(new_lead(tenant_id, Uuid::new_v4())).await.unwrap();

    repo.assign(tenant_id, lead.id, user).await.unwrap().unwrap();
    let declined = repo.decline(tenant_id, lead.id, user).await.unwrap().unwrap();

    assert_eq!(declined.status, LeadStatus::New);
    assert!(declined.assigned_user_id.is_none());

    // It can be handed to someone else afterwards.
    let other = Uuid::new_v4();
    let reassigned = repo.assign(tenant_id, lead.id, other).await.unwrap().unwrap();
    assert_eq!(reassigned.assigned_user_id, Some(other));
}

#[tokio::test]
async fn only_the_assignee_can_accept_or_decline() {
    let (repo, tenant_id) = setup().await;
    let user = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let lead = repo.create(new_lead(tenant_id, Uuid::new_v4())).await.unwrap();
    repo.assign(tenant_id, lead.id, user).await.unwrap().unwrap();

    assert!(repo.accept(tenant_id, lead.id, stranger).await.unwrap().is_none());
    assert!(repo.decline(tenant_id, lead.id, stranger).await.unwrap().is_none());

    let still = repo.get_by_id(tenant_id, lead.id).await.unwrap();
    assert_eq!(still.status, LeadStatus::Pending);
}

#[tokio::test]
async fn cannot_invoice_a_lead_that_is_not_accepted() {
    let (repo, tenant_id) = setup().await;
    let lead = repo.create(new_lead(tenant_id, Uuid::new_v4())).await.unwrap();

    let result = repo
        .mark_invoiced(tenant_id, lead.id, Uuid::new_v4())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn concurrent_assign_has_exactly_one_winner() {
    let (repo, tenant_id) = setup().await;
    let lead = repo.create(new_lead(tenant_id, Uuid::new_v4())).await.unwrap();
    let (first, second) = (Uuid::new_v4(), Uuid::new_v4());

    let (a, b) = tokio::join!(
        repo.assign(tenant_id, lead.id, first),
        repo.assign(tenant_id, lead.id, second),
    );

    let won = |r: &Result<Option<_>, LeadportError>| matches!(r, Ok(Some(_)));
    let lost = |r: &Result<Option<_>, LeadportError>| {
        matches!(r, Ok(None) | Err(LeadportError::Conflict { .. }))
    };
    assert!(
        (won(&a) && lost(&b)) || (lost(&a) && won(&b)),
        "expected one winner, got {a:?} / {b:?}"
    );

    let stored = repo.get_by_id(tenant_id, lead.id).await.unwrap();
    assert_eq!(stored.status, LeadStatus::Pending);
    assert!(matches!(stored.assigned_user_id, Some(id) if id == first || id == second));
}

#[tokio::test]
async fn update_details_sets_and_clears_fields() {
    let (repo, tenant_id) = setup().await;
    let lead = repo.create(new_lead(tenant_id, Uuid::new_v4())).await.unwrap();

    let updated = repo
        .update_details(
            tenant_id,
            lead.id,
            UpdateLead {
                phone: Some(Some("+1 555 0100".into())),
                company: Some(None),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.phone.as_deref(), Some("+1 555 0100"));
    assert_eq!(updated.company, None);
    assert_eq!(updated.first_name, "Grace");
}

#[tokio::test]
async fn guarded_update_skips_lead_that_left_expected_status() {
    let (repo, tenant_id) = setup().await;
    let lead = repo.create(new_lead(tenant_id, Uuid::new_v4())).await.unwrap();
    let patch = UpdateLead {
        notes: Some(Some("Call after 5pm".into())),
        ..Default::default()
    };

    // Assignment lands between the caller's read and its write.
    repo.assign(tenant_id, lead.id, Uuid::new_v4())
        .await
        .unwrap()
        .unwrap();

    let skipped = repo
        .update_details(tenant_id, lead.id, patch.clone(), Some(LeadStatus::New))
        .await
        .unwrap();
    assert!(skipped.is_none());
    let stored = repo.get_by_id(tenant_id, lead.id).await.unwrap();
    assert_eq!(stored.notes, None);

    let applied = repo
        .update_details(tenant_id, lead.id, patch, Some(LeadStatus::Pending))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(applied.notes.as_deref(), Some("Call after 5pm"));
    assert_eq!(applied.status, LeadStatus::Pending);
}

#[tokio::test]
async fn update_details_of_missing_lead_writes_nothing() {
    let (repo, tenant_id) = setup().await;
    let result = repo
        .update_details(
            tenant_id,
            Uuid::new_v4(),
            UpdateLead {
                notes: Some(Some("ghost".into())),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn delete_only_removes_new_leads() {
    let (repo, tenant_id) = setup().await;
    let fresh = repo.create(new_lead(tenant_id, Uuid::new_v4())).await.unwrap();
    let taken = repo.create(new_lead(tenant_id, Uuid::new_v4())).await.unwrap();
    repo.assign(tenant_id, taken.id, Uuid::new_v4())
        .await
        .unwrap()
        .unwrap();

    assert!(repo.delete_new(tenant_id, fresh.id).await.unwrap());
    assert!(!repo.delete_new(tenant_id, taken.id).await.unwrap());
    assert!(repo.get_by_id(tenant_id, taken.id).await.is_ok());
    assert!(matches!(
        repo.get_by_id(tenant_id, fresh.id).await,
        Err(LeadportError::NotFound { .. })
    ));
}

#[tokio::test]
async fn list_filters_by_status_and_agent() {
    let (repo, tenant_id) = setup().await;
    let agent = Uuid::new_v4();
    let user = Uuid::new_v4();

    let a = repo.create(new_lead(tenant_id, agent)).await.unwrap();
    repo.create(new_lead(tenant_id, agent)).await.unwrap();
    repo.create(new_lead(tenant_id, Uuid::new_v4())).await.unwrap();
    repo.assign(tenant_id, a.id, user).await.unwrap().unwrap();

    let by_agent = repo
        .list(
            tenant_id,
            LeadFilter {
                agent_id: Some(agent),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_agent.total, 2);

    let pending = repo
        .list(
            tenant_id,
            LeadFilter {
                status: Some(LeadStatus::Pending),
                assigned_user_id: Some(user),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(pending.total, 1);
    assert_eq!(pending.items[0].id, a.id);

    let page = repo
        .list(tenant_id, LeadFilter::default(), Pagination::new(Some(0), Some(2)))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
}
