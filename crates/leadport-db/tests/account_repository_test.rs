//! Integration tests for Tenant, User and Session repositories using
//! in-memory SurrealDB.

use chrono::{Duration, Utc};
use leadport_core::error::LeadportError;
use leadport_core::models::session::CreateSession;
use leadport_core::models::tenant::CreateTenant;
use leadport_core::models::user::{CreateUser, Role, UpdateUser, UserStatus};
use leadport_core::repository::{
    Pagination, SessionRepository, TenantRepository, UserRepository,
};
use leadport_db::repository::{
    SurrealSessionRepository, SurrealTenantRepository, SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (Surreal<Db>, Uuid) {
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

    (db, tenant.id)
}

fn new_user(tenant_id: Uuid, email: &str, role: Role) -> CreateUser {
    CreateUser {
        tenant_id,
        email: email.into(),
        name: "Test User".into(),
        password: "correct horse".into(),
        role,
    }
}

#[tokio::test]
async fn tenant_lookup_by_slug() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let tenant = repo.get_by_slug("acme").await.unwrap();
    assert_eq!(tenant.id, tenant_id);
    assert_eq!(tenant.name, "Acme Outbound");

    let missing = repo.get_by_slug("nope").await;
    assert!(matches!(missing, Err(LeadportError::NotFound { .. })));
}

#[tokio::test]
async fn duplicate_tenant_slug_is_rejected() {
    let (db, _) = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let result = repo
        .create(CreateTenant {
            name: "Other".into(),
            slug: "acme".into(),
        })
        .await;
    assert!(matches!(result, Err(LeadportError::AlreadyExists { .. })));
}

#[tokio::test]
async fn create_user_hashes_password_and_folds_email() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(new_user(tenant_id, "Alice@Example.com", Role::User))
        .await
        .unwrap();

    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.status, UserStatus::Active);
    assert!(user.password_hash.starts_with("$argon2id$"));

    let fetched = repo.get_by_email(tenant_id, "ALICE@example.com").await.unwrap();
    assert_eq!(fetched.id, user.id);
}

#[tokio::test]
async fn duplicate_email_in_tenant_is_rejected() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    repo.create(new_user(tenant_id, "bob@example.com", Role::User))
        .await
        .unwrap();
    let result = repo
        .create(new_user(tenant_id, "bob@example.com", Role::Agent))
        .await;

    assert!(matches!(result, Err(LeadportError::AlreadyExists { .. })));
}

#[tokio::test]
async fn users_are_tenant_isolated() {
    let (db, tenant_id) = setup().await;
    let other = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "Other".into(),
            slug: "other".into(),
        })
        .await
        .unwrap();
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(new_user(tenant_id, "carol@example.com", Role::User))
        .await
        .unwrap();

    let cross = repo.get_by_id(other.id, user.id).await;
    assert!(matches!(cross, Err(LeadportError::NotFound { .. })));
}

#[tokio::test]
async fn update_and_list_users_by_role() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let agent = repo
        .create(new_user(tenant_id, "agent@example.com", Role::Agent))
        .await
        .unwrap();
    repo.create(new_user(tenant_id, "user@example.com", Role::User))
        .await
        .unwrap();

    let updated = repo
        .update(
            tenant_id,
            agent.id,
            UpdateUser {
                status: Some(UserStatus::Disabled),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, UserStatus::Disabled);
    assert_eq!(updated.role, Role::Agent);

    let agents = repo
        .list(tenant_id, Some(Role::Agent), Pagination::default())
        .await
        .unwrap();
    assert_eq!(agents.total, 1);
    assert_eq!(agents.items[0].id, agent.id);

    let everyone = repo
        .list(tenant_id, None, Pagination::default())
        .await
        .unwrap();
    assert_eq!(everyone.total, 2);
}

#[tokio::test]
async fn session_lookup_and_invalidation() {
    let (db, tenant_id) = setup().await;
    let user = SurrealUserRepository::new(db.clone())
        .create(new_user(tenant_id, "dave@example.com", Role::User))
        .await
        .unwrap();
    let repo = SurrealSessionRepository::new(db);

    let session = repo
        .create(CreateSession {
            tenant_id,
            user_id: user.id,
            token_hash: "abc123".into(),
            ip_address: Some("127.0.0.1".into()),
            user_agent: None,
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .unwrap();

    let found = repo.get_by_token_hash("abc123").await.unwrap();
    assert_eq!(found.id, session.id);
    assert_eq!(found.tenant_id, tenant_id);

    repo.invalidate(tenant_id, session.id).await.unwrap();
    let gone = repo.get_by_token_hash("abc123").await;
    assert!(matches!(gone, Err(LeadportError::NotFound { .. })));
}

#[tokio::test]
async fn cleanup_removes_only_expired_sessions() {
    let (db, tenant_id) = setup().await;
    let user = SurrealUserRepository::new(db.clone())
        .create(new_user(tenant_id, "erin@example.com", Role::User))
        .await
        .unwrap();
    let repo = SurrealSessionRepository::new(db);

    for (hash, offset) in [("old", -1), ("fresh", 1)] {
        repo.create(CreateSession {
            tenant_id,
            user_id: user.id,
            token_hash: hash.into(),
            ip_address: None,
            user_agent: None,
            expires_at: Utc::now() + Duration::hours(offset),
        })
        .await
        .unwrap();
    }

    let removed = repo.purge_expired().await.unwrap();
    assert_eq!(removed, 1);
    assert!(repo.get_by_token_hash("fresh").await.is_ok());
    assert!(repo.get_by_token_hash("old").await.is_err());

    repo.invalidate_user_sessions(tenant_id, user.id)
        .await
        .unwrap();
    assert!(repo.get_by_token_hash("fresh").await.is_err());
}
