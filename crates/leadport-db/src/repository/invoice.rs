//! SurrealDB implementation of [`InvoiceRepository`].

use chrono::{DateTime, Utc};
use leadport_core::error::LeadportResult;
use leadport_core::models::invoice::{CreateInvoice, Invoice, InvoiceFilter, InvoiceStatus};
use leadport_core::repository::{InvoiceRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_enum, parse_uuid};

use super::CountRow;

#[derive(Debug, SurrealValue)]
struct InvoiceRow {
    tenant_id: String,
    lead_id: String,
    user_id: String,
    amount_cents: i64,
    currency: String,
    status: String,
    stripe_session_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct InvoiceRowWithId {
    record_id: String,
    tenant_id: String,
    lead_id: String,
    user_id: String,
    amount_cents: i64,
    currency: String,
    status: String,
    stripe_session_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_invoice(self, id: Uuid) -> Result<Invoice, DbError> {
        Ok(Invoice {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            lead_id: parse_uuid(&self.lead_id, "lead")?,
            user_id: parse_uuid(&self.user_id, "user")?,
            amount_cents: self.amount_cents,
            currency: self.currency,
            status: parse_enum::<InvoiceStatus>(&self.status)?,
            stripe_session_id: self.stripe_session_id,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl InvoiceRowWithId {
    fn try_into_invoice(self) -> Result<Invoice, DbError> {
        let id = parse_uuid(&self.record_id, "invoice")?;
        InvoiceRow {
            tenant_id: self.tenant_id,
            lead_id: self.lead_id,
            user_id: self.user_id,
            amount_cents: self.amount_cents,
            currency: self.currency,
            status: self.status,
            stripe_session_id: self.stripe_session_id,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_invoice(id)
    }
}

/// SurrealDB implementation of the Invoice repository.
#[derive(Clone)]
pub struct SurrealInvoiceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealInvoiceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> InvoiceRepository for SurrealInvoiceRepository<C> {
    async fn create(&self, input: CreateInvoice) -> LeadportResult<Invoice> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('invoice', $id) SET \
                 tenant_id = $tenant_id, lead_id = $lead_id, \
                 user_id = $user_id, amount_cents = $amount_cents, \
                 currency = $currency, status = 'PENDING'",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("lead_id", input.lead_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("amount_cents", input.amount_cents))
            .bind(("currency", input.currency.to_lowercase()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify(e, "invoice"))?;

        let rows: Vec<InvoiceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "invoice".into(),
            id: id_str,
        })?;

        Ok(row.into_invoice(id)?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<Invoice> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('invoice', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InvoiceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "invoice".into(),
            id: id_str,
        })?;

        Ok(row.into_invoice(id)?)
    }

    async fn get_by_lead(&self, tenant_id: Uuid, lead_id: Uuid) -> LeadportResult<Option<Invoice>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM invoice \
                 WHERE tenant_id = $tenant_id AND lead_id = $lead_id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("lead_id", lead_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InvoiceRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.try_into_invoice())
            .transpose()?)
    }

    async fn get_by_stripe_session(&self, session_id: &str) -> LeadportResult<Option<Invoice>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM invoice \
                 WHERE stripe_session_id = $session_id",
            )
            .bind(("session_id", session_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InvoiceRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.try_into_invoice())
            .transpose()?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: InvoiceFilter,
        pagination: Pagination,
    ) -> LeadportResult<PaginatedResult<Invoice>> {
        let mut clauses = vec!["tenant_id = $tenant_id"];
        if filter.user_id.is_some() {
            clauses.push("user_id = $user_id");
        }
        if filter.status.is_some() {
            clauses.push("status = $status");
        }
        let where_clause = clauses.join(" AND ");

        let count_sql =
            format!("SELECT count() AS total FROM invoice WHERE {where_clause} GROUP ALL");
        let page_sql = format!(
            "SELECT meta::id(id) AS record_id, * FROM invoice \
             WHERE {where_clause} \
             ORDER BY created_at DESC \
             LIMIT $limit START $offset"
        );

        let bindings: Vec<(&'static str, String)> = [
            filter.user_id.map(|u| ("user_id", u.to_string())),
            filter.status.map(|s| ("status", s.as_str().to_string())),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut count_query = self
            .db
            .query(&count_sql)
            .bind(("tenant_id", tenant_id.to_string()));
        for binding in &bindings {
            count_query = count_query.bind(binding.clone());
        }
        let mut count_result = count_query.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut page_query = self
            .db
            .query(&page_sql)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for binding in bindings {
            page_query = page_query.bind(binding);
        }
        let mut result = page_query.await.map_err(DbError::from)?;

        let rows: Vec<InvoiceRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_invoice())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn mark_paid(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        stripe_session_id: &str,
    ) -> LeadportResult<Option<Invoice>> {
        let result = self
            .db
            .query(
                "UPDATE type::record('invoice', $id) SET \
                 status = 'PAID', stripe_session_id = $session_id, \
                 paid_at = time::now(), updated_at = time::now() \
                 WHERE tenant_id = $tenant_id AND status = 'PENDING'",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("session_id", stripe_session_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify(e, "invoice"))?;

        let rows: Vec<InvoiceRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.into_invoice(id))
            .transpose()?)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<()> {
        self.db
            .query("DELETE type::record('invoice', $id) WHERE tenant_id = $tenant_id")
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::classify(e, "invoice"))?;

        Ok(())
    }
}
