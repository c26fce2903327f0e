//! SurrealDB implementation of [`PurchaseRepository`].

use chrono::{DateTime, Utc};
use leadport_core::error::LeadportResult;
use leadport_core::models::purchase::{CreatePurchase, Purchase, PurchaseStatus};
use leadport_core::repository::PurchaseRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_enum, parse_uuid};

#[derive(Debug, SurrealValue)]
struct PurchaseRow {
    tenant_id: String,
    user_id: String,
    package_id: String,
    amount_cents: i64,
    status: String,
    expires_at: DateTime<Utc>,
    stripe_session_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct PurchaseRowWithId {
    record_id: String,
    tenant_id: String,
    user_id: String,
    package_id: String,
    amount_cents: i64,
    status: String,
    expires_at: DateTime<Utc>,
    stripe_session_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PurchaseRow {
    fn into_purchase(self, id: Uuid) -> Result<Purchase, DbError> {
        Ok(Purchase {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            user_id: parse_uuid(&self.user_id, "user")?,
            package_id: parse_uuid(&self.package_id, "package")?,
            amount_cents: self.amount_cents,
            status: parse_enum::<PurchaseStatus>(&self.status)?,
            expires_at: self.expires_at,
            stripe_session_id: self.stripe_session_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl PurchaseRowWithId {
    fn try_into_purchase(self) -> Result<Purchase, DbError> {
        let id = parse_uuid(&self.record_id, "purchase")?;
        PurchaseRow {
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            package_id: self.package_id,
            amount_cents: self.amount_cents,
            status: self.status,
            expires_at: self.expires_at,
            stripe_session_id: self.stripe_session_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_purchase(id)
    }
}

/// SurrealDB implementation of the Purchase repository.
#[derive(Clone)]
pub struct SurrealPurchaseRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPurchaseRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn set_status_from_active(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: PurchaseStatus,
    ) -> LeadportResult<Option<Purchase>> {
        let result = self
            .db
            .query(
                "UPDATE type::record('purchase', $id) SET \
                 status = $status, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id AND status = 'ACTIVE'",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("status", status.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify(e, "purchase"))?;

        let rows: Vec<PurchaseRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.into_purchase(id))
            .transpose()?)
    }
}

impl<C: Connection> PurchaseRepository for SurrealPurchaseRepository<C> {
    async fn create(&self, input: CreatePurchase) -> LeadportResult<Purchase> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('purchase', $id) SET \
                 tenant_id = $tenant_id, user_id = $user_id, \
                 package_id = $package_id, amount_cents = $amount_cents, \
                 status = 'ACTIVE', expires_at = $expires_at, \
                 stripe_session_id = $stripe_session_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("package_id", input.package_id.to_string()))
            .bind(("amount_cents", input.amount_cents))
            .bind(("expires_at", input.expires_at))
            .bind(("stripe_session_id", input.stripe_session_id))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify(e, "purchase"))?;

        let rows: Vec<PurchaseRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "purchase".into(),
            id: id_str,
        })?;

        Ok(row.into_purchase(id)?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<Purchase> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('purchase', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PurchaseRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "purchase".into(),
            id: id_str,
        })?;

        Ok(row.into_purchase(id)?)
    }

    async fn get_by_stripe_session(&self, session_id: &str) -> LeadportResult<Option<Purchase>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM purchase \
                 WHERE stripe_session_id = $session_id",
            )
            .bind(("session_id", session_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PurchaseRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.try_into_purchase())
            .transpose()?)
    }

    async fn find_active_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<Option<Purchase>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM purchase \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id \
                 AND status = 'ACTIVE' \
                 ORDER BY created_at DESC LIMIT 1",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PurchaseRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.try_into_purchase())
            .transpose()?)
    }

    async fn list_by_user(&self, tenant_id: Uuid, user_id: Uuid) -> LeadportResult<Vec<Purchase>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM purchase \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id \
                 ORDER BY created_at DESC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PurchaseRowWithId> = result.take(0).map_err(DbError::from)?;
        let purchases = rows
            .into_iter()
            .map(|row| row.try_into_purchase())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(purchases)
    }

    async fn mark_expired(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<Option<Purchase>> {
        self.set_status_from_active(tenant_id, id, PurchaseStatus::Expired)
            .await
    }

    async fn cancel(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<Option<Purchase>> {
        self.set_status_from_active(tenant_id, id, PurchaseStatus::Cancelled)
            .await
    }
}
