//! First-run provisioning of a tenant and its administrator.

use leadport_core::error::{LeadportError, LeadportResult};
use leadport_core::models::tenant::{CreateTenant, Tenant};
use leadport_core::models::user::{CreateUser, Role, User};
use leadport_core::repository::{TenantRepository, UserRepository};
use leadport_db::repository::{SurrealTenantRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tracing::info;

use crate::config::BootstrapConfig;
use crate::state::Auth;

/// Ensure the configured tenant and admin exist. Safe to run on every
/// start; existing records are left untouched, including the admin's
/// password.
pub async fn run(db: &Surreal<Any>, auth: &Auth, config: &BootstrapConfig) -> LeadportResult<()> {
    let tenant = ensure_tenant(db, config).await?;
    ensure_admin(db, auth, &tenant, config).await?;
    Ok(())
}

async fn ensure_tenant(db: &Surreal<Any>, config: &BootstrapConfig) -> LeadportResult<Tenant> {
    let tenants = SurrealTenantRepository::new(db.clone());
    match tenants.get_by_slug(&config.tenant_slug).await {
        Ok(tenant) => Ok(tenant),
        Err(LeadportError::NotFound { .. }) => {
            let tenant = tenants
                .create(CreateTenant {
                    name: config.tenant_name.clone(),
                    slug: config.tenant_slug.clone(),
                })
                .await?;
            info!(tenant_id = %tenant.id, slug = %tenant.slug, "Bootstrap tenant created");
            Ok(tenant)
        }
        Err(e) => Err(e),
    }
}

async fn ensure_admin(
    db: &Surreal<Any>,
    auth: &Auth,
    tenant: &Tenant,
    config: &BootstrapConfig,
) -> LeadportResult<User> {
    let users = SurrealUserRepository::new(db.clone());
    match users.get_by_email(tenant.id, &config.admin_email).await {
        Ok(user) => {
            if user.role != Role::Admin {
                return Err(LeadportError::conflict(format!(
                    "bootstrap admin {} exists with role {}",
                    config.admin_email,
                    user.role.as_str()
                )));
            }
            Ok(user)
        }
        Err(LeadportError::NotFound { .. }) => {
            let admin = auth
                .provision(CreateUser {
                    tenant_id: tenant.id,
                    email: config.admin_email.clone(),
                    name: "Administrator".into(),
                    password: config.admin_password.clone(),
                    role: Role::Admin,
                })
                .await?;
            info!(tenant_id = %tenant.id, user_id = %admin.id, "Bootstrap admin created");
            Ok(admin)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use leadport_auth::AuthConfig;
    use leadport_auth::AuthService;
    use leadport_db::repository::SurrealSessionRepository;
    use surrealdb::engine::any;

    use super::*;

    async fn setup() -> (Surreal<Any>, Auth) {
        let db = any::connect("mem://").await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        leadport_db::run_migrations(&db).await.unwrap();
        let auth = AuthService::new(
            SurrealTenantRepository::new(db.clone()),
            SurrealUserRepository::new(db.clone()),
            SurrealSessionRepository::new(db.clone()),
            AuthConfig::default(),
        );
        (db, auth)
    }

    fn config() -> BootstrapConfig {
        BootstrapConfig {
            tenant_slug: "acme".into(),
            tenant_name: "Acme Leads".into(),
            admin_email: "root@acme.test".into(),
            admin_password: "Sup3r-secret-pass".into(),
        }
    }

    #[tokio::test]
    async fn bootstrap_is_repeatable() {
        let (db, auth) = setup().await;
        run(&db, &auth, &config()).await.unwrap();
        run(&db, &auth, &config()).await.unwrap();

        let tenant = SurrealTenantRepository::new(db.clone())
            .get_by_slug("acme")
            .await
            .unwrap();
        assert_eq!(tenant.name, "Acme Leads");
        let admin = SurrealUserRepository::new(db.clone())
            .get_by_email(tenant.id, "root@acme.test")
            .await
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn existing_non_admin_is_not_promoted() {
        let (db, auth) = setup().await;
        let tenant = ensure_tenant(&db, &config()).await.unwrap();
        auth.provision(CreateUser {
            tenant_id: tenant.id,
            email: "root@acme.test".into(),
            name: "Buyer".into(),
            password: "Sup3r-secret-pass".into(),
            role: Role::User,
        })
        .await
        .unwrap();

        let err = run(&db, &auth, &config()).await.unwrap_err();
        assert!(matches!(err, LeadportError::Conflict { .. }));
    }
}
