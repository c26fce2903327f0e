//! SurrealDB implementation of [`LeadRepository`].
//!
//! Every status transition is a single `UPDATE ... WHERE status = <prior>`
//! statement. SurrealDB returns the updated records, so an empty result
//! means the guard did not hold and the transition is reported as `None`.

use chrono::{DateTime, Utc};
use leadport_core::error::LeadportResult;
use leadport_core::models::lead::{CreateLead, Lead, LeadFilter, LeadStatus, UpdateLead};
use leadport_core::repository::{LeadRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_enum, parse_opt_uuid, parse_uuid};

use super::CountRow;

#[derive(Debug, SurrealValue)]
struct LeadRow {
    tenant_id: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    job_title: Option<String>,
    notes: Option<String>,
    status: String,
    agent_id: String,
    assigned_user_id: Option<String>,
    invoice_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct LeadRowWithId {
    record_id: String,
    tenant_id: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    job_title: Option<String>,
    notes: Option<String>,
    status: String,
    agent_id: String,
    assigned_user_id: Option<String>,
    invoice_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LeadRow {
    fn into_lead(self, id: Uuid) -> Result<Lead, DbError> {
        Ok(Lead {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            company: self.company,
            job_title: self.job_title,
            notes: self.notes,
            status: parse_enum::<LeadStatus>(&self.status)?,
            agent_id: parse_uuid(&self.agent_id, "agent")?,
            assigned_user_id: parse_opt_uuid(self.assigned_user_id, "assigned user")?,
            invoice_id: parse_opt_uuid(self.invoice_id, "invoice")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl LeadRowWithId {
    fn try_into_lead(self) -> Result<Lead, DbError> {
        let id = parse_uuid(&self.record_id, "lead")?;
        LeadRow {
            tenant_id: self.tenant_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            company: self.company,
            job_title: self.job_title,
            notes: self.notes,
            status: self.status,
            agent_id: self.agent_id,
            assigned_user_id: self.assigned_user_id,
            invoice_id: self.invoice_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_lead(id)
    }
}

/// SurrealDB implementation of the Lead repository.
#[derive(Clone)]
pub struct SurrealLeadRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealLeadRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Run a guarded transition and return the updated lead, if any.
    ///
    /// `sql` must update `type::record('lead', $id)` and filter on
    /// `$tenant_id`; `extra` supplies any further bindings.
    async fn transition(
        &self,
        sql: &'static str,
        tenant_id: Uuid,
        id: Uuid,
        extra: Option<(&'static str, String)>,
    ) -> LeadportResult<Option<Lead>> {
        let mut builder = self
            .db
            .query(sql)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));
        if let Some((name, value)) = extra {
            builder = builder.bind((name, value));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::classify(e, "lead"))?;

        let rows: Vec<LeadRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_lead(id)?)),
            None => {
                debug!(lead_id = %id, "Lead transition guard did not match");
                Ok(None)
            }
        }
    }
}

impl<C: Connection> LeadRepository for SurrealLeadRepository<C> {
    async fn create(&self, input: CreateLead) -> LeadportResult<Lead> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('lead', $id) SET \
                 tenant_id = $tenant_id, agent_id = $agent_id, \
                 first_name = $first_name, last_name = $last_name, \
                 email = $email, phone = $phone, company = $company, \
                 job_title = $job_title, notes = $notes, \
                 status = 'NEW'",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("agent_id", input.agent_id.to_string()))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("email", input.email))
            .bind(("phone", input.phone))
            .bind(("company", input.company))
            .bind(("job_title", input.job_title))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::classify(e, "lead"))?;

        let rows: Vec<LeadRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "lead".into(),
            id: id_str,
        })?;

        Ok(row.into_lead(id)?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<Lead> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('lead', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<LeadRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "lead".into(),
            id: id_str,
        })?;

        Ok(row.into_lead(id)?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: LeadFilter,
        pagination: Pagination,
    ) -> LeadportResult<PaginatedResult<Lead>> {
        let mut clauses = vec!["tenant_id = $tenant_id"];
        if filter.status.is_some() {
            clauses.push("status = $status");
        }
        if filter.agent_id.is_some() {
            clauses.push("agent_id = $agent_id");
        }
        if filter.assigned_user_id.is_some() {
            clauses.push("assigned_user_id = $assigned_user_id");
        }
        let where_clause = clauses.join(" AND ");

        let count_sql = format!("SELECT count() AS total FROM lead WHERE {where_clause} GROUP ALL");
        let page_sql = format!(
            "SELECT meta::id(id) AS record_id, * FROM lead \
             WHERE {where_clause} \
             ORDER BY created_at DESC \
             LIMIT $limit START $offset"
        );

        let bindings: Vec<(&'static str, String)> = [
            filter.status.map(|s| ("status", s.as_str().to_string())),
            filter.agent_id.map(|a| ("agent_id", a.to_string())),
            filter.assigned_user_id.map(|u| ("assigned_user_id", u.to_string())),
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

        let rows: Vec<LeadRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_lead())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update_details(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateLead,
        expected: Option<LeadStatus>,
    ) -> LeadportResult<Option<Lead>> {

        let mut sets = Vec::new();
        if input.first_name.is_some() {
            sets.push("first_name = $first_name");
        }
        if input.last_name.is_some() {
            sets.push("last_name = $last_name");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.phone.is_some() {
            sets.push("phone = $phone");
        }
        if input.company.is_some() {
            sets.push("company = $company");
        }
        if input.job_title.is_some() {
            sets.push("job_title = $job_title");
        }
        if input.notes.is_some() {
            sets.push("notes = $notes");
        }
        sets.push("updated_at = time::now()");

        let guard = if expected.is_some() {
            " AND status = $expected"
        } else {
            ""
        };
        let query = format!(
            "UPDATE type::record('lead', $id) SET {} \
             WHERE tenant_id = $tenant_id{guard}",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));
        if let Some(status) = expected {
            builder = builder.bind(("expected", status.as_str().to_string()));
        }

        if let Some(first_name) = input.first_name {
            builder = builder.bind(("first_name", first_name));
        }
        if let Some(last_name) = input.last_name {
            builder = builder.bind(("last_name", last_name));
        }
        // Inner `None` clears the field.
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(phone) = input.phone {
            builder = builder.bind(("phone", phone));
        }
        if let Some(company) = input.company {
            builder = builder.bind(("company", company));
        }
        if let Some(job_title) = input.job_title {
            builder = builder.bind(("job_title", job_title));
        }
        if let Some(notes) = input.notes {
            builder = builder.bind(("notes", notes));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::classify(e, "lead"))?;

        let rows: Vec<LeadRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_lead(id)?)),
            None => Ok(None),
        }
    }

    async fn delete_new(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<bool> {
        let result = self
            .db
            .query(
                "DELETE type::record('lead', $id) \
                 WHERE tenant_id = $tenant_id AND status = 'NEW' \
                 RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::classify(e, "lead"))?;
        let rows: Vec<LeadRow> = result.take(0).map_err(DbError::from)?;

        Ok(!rows.is_empty())
    }

    async fn assign(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<Option<Lead>> {
        self.transition(
            "UPDATE type::record('lead', $id) SET \
             status = 'PENDING', assigned_user_id = $user_id, \
             updated_at = time::now() \
             WHERE tenant_id = $tenant_id AND status = 'NEW'",
            tenant_id,
            id,
            Some(("user_id", user_id.to_string())),
        )
        .await
    }

    async fn accept(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<Option<Lead>> {
        self.transition(
            "UPDATE type::record('lead', $id) SET \
             status = 'ACCEPTED', updated_at = time::now() \
             WHERE tenant_id = $tenant_id AND status = 'PENDING' \
             AND assigned_user_id = $user_id",
            tenant_id,
            id,
            Some(("user_id", user_id.to_string())),
        )
        .await
    }

    async fn decline(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<Option<Lead>> {
        self.transition(
            "UPDATE type::record('lead', $id) SET \
             status = 'NEW', assigned_user_id = NONE, \
             updated_at = time::now() \
             WHERE tenant_id = $tenant_id AND status = 'PENDING' \
             AND assigned_user_id = $user_id",
            tenant_id,
            id,
            Some(("user_id", user_id.to_string())),
        )
        .await
    }

    async fn mark_invoiced(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        invoice_id: Uuid,
    ) -> LeadportResult<Option<Lead>> {
        self.transition(
            "UPDATE type::record('lead', $id) SET \
             status = 'INVOICED', invoice_id = $invoice_id, \
             updated_at = time::now() \
             WHERE tenant_id = $tenant_id AND status = 'ACCEPTED'",
            tenant_id,
            id,
            Some(("invoice_id", invoice_id.to_string())),
        )
        .await
    }

    async fn mark_paid(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<Option<Lead>> {
        self.transition(
            "UPDATE type::record('lead', $id) SET \
             status = 'PAID', updated_at = time::now() \
             WHERE tenant_id = $tenant_id AND status = 'INVOICED'",
            tenant_id,
            id,
            None,
        )
        .await
    }
}
