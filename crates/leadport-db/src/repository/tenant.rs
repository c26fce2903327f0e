//! SurrealDB implementation of [`TenantRepository`].
//!
//! Slugs are stored lower-case and matched case-insensitively, so a
//! portal typed as `Acme` at login resolves to `acme`.

use chrono::{DateTime, Utc};
use leadport_core::error::LeadportResult;
use leadport_core::models::tenant::{CreateTenant, Tenant};
use leadport_core::repository::TenantRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

const SELECT_TENANT: &str = "SELECT meta::id(id) AS record_id, name, slug, created_at, updated_at FROM tenant";

#[derive(Debug, SurrealValue)]
struct TenantRow {
    record_id: String,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = DbError;

    fn try_from(row: TenantRow) -> Result<Self, DbError> {
        Ok(Tenant {
            id: parse_uuid(&row.record_id, "tenant")?,
            name: row.name,
            slug: row.slug,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn normalize_slug(slug: &str) -> String {
    slug.trim().to_ascii_lowercase()
}

#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(
        &self,
        filter: &str,
        bind: (&'static str, String),
        missing: String,
    ) -> Result<Tenant, DbError> {
        let mut result = self
            .db
            .query(format!("{SELECT_TENANT} WHERE {filter}"))
            .bind(bind)
            .await?;
        let rows: Vec<TenantRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or(DbError::NotFound {
                entity: "tenant".into(),
                id: missing,
            })?
            .try_into()
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> LeadportResult<Tenant> {
        let id = Uuid::new_v4();

        self.db
            .query("CREATE type::record('tenant', $id) SET name = $name, slug = $slug")
            .bind(("id", id.to_string()))
            .bind(("name", input.name.trim().to_string()))
            .bind(("slug", normalize_slug(&input.slug)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::classify(e, "tenant"))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> LeadportResult<Tenant> {
        Ok(self
            .fetch_one("id = type::record('tenant', $id)", ("id", id.to_string()), id.to_string())
            .await?)
    }

    async fn get_by_slug(&self, slug: &str) -> LeadportResult<Tenant> {
        let slug = normalize_slug(slug);
        Ok(self
            .fetch_one("slug = $slug", ("slug", slug.clone()), format!("slug={slug}"))
            .await?)
    }
}
