//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter to enforce data isolation.
//!
//! Status transitions are expressed as guarded operations returning
//! `Option<T>`: `None` means no row matched the expected prior state,
//! i.e. the caller lost a race or the precondition never held.

use uuid::Uuid;

use crate::error::LeadportResult;
use crate::models::{
    invoice::{CreateInvoice, Invoice, InvoiceFilter},
    lead::{CreateLead, Lead, LeadFilter, LeadStatus, UpdateLead},
    package::{CreatePackage, Package, UpdatePackage},
    purchase::{CreatePurchase, Purchase},
    session::{CreateSession, Session},
    tenant::{CreateTenant, Tenant},
    user::{CreateUser, Role, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

impl Pagination {
    /// Upper bound applied to caller-supplied limits.
    pub const MAX_LIMIT: u64 = 200;

    pub fn new(offset: Option<u64>, limit: Option<u64>) -> Self {
        let defaults = Self::default();
        Self {
            offset: offset.unwrap_or(defaults.offset),
            limit: limit.unwrap_or(defaults.limit).clamp(1, Self::MAX_LIMIT),
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenant (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = LeadportResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = LeadportResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = LeadportResult<Tenant>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = LeadportResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = LeadportResult<User>> + Send;
    fn get_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> impl Future<Output = LeadportResult<User>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = LeadportResult<User>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        role: Option<Role>,
        pagination: Pagination,
    ) -> impl Future<Output = LeadportResult<PaginatedResult<User>>> + Send;
}

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession)
    -> impl Future<Output = LeadportResult<Session>> + Send;
    /// Look a session up by token hash across all tenants.
    ///
    /// The cookie carries no tenant, so this is the one lookup that is
    /// not tenant-scoped; the returned session names its tenant.
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = LeadportResult<Session>> + Send;
    fn invalidate(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = LeadportResult<()>> + Send;
    fn invalidate_user_sessions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = LeadportResult<()>> + Send;
    /// Delete expired sessions in every tenant; returns how many went.
    fn purge_expired(&self) -> impl Future<Output = LeadportResult<u64>> + Send;
}

pub trait PackageRepository: Send + Sync {
    fn create(&self, input: CreatePackage)
    -> impl Future<Output = LeadportResult<Package>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = LeadportResult<Package>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePackage,
    ) -> impl Future<Output = LeadportResult<Package>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        active_only: bool,
    ) -> impl Future<Output = LeadportResult<Vec<Package>>> + Send;
}

pub trait LeadRepository: Send + Sync {
    fn create(&self, input: CreateLead) -> impl Future<Output = LeadportResult<Lead>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = LeadportResult<Lead>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: LeadFilter,
        pagination: Pagination,
    ) -> impl Future<Output = LeadportResult<PaginatedResult<Lead>>> + Send;
    /// Patch contact details. With `expected` set, the write only applies
    /// while the lead is still in that status; `None` means nothing was
    /// written.
    fn update_details(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateLead,
        expected: Option<LeadStatus>,
    ) -> impl Future<Output = LeadportResult<Option<Lead>>> + Send;
    /// Delete a lead that is still `New`. Returns whether a row was removed.
    fn delete_new(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = LeadportResult<bool>> + Send;

    /// `New -> Pending`, recording the assignee.
    fn assign(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = LeadportResult<Option<Lead>>> + Send;
    /// `Pending -> Accepted`, only for the current assignee.
    fn accept(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = LeadportResult<Option<Lead>>> + Send;
    /// `Pending -> New`, only for the current assignee; clears the assignment.
    fn decline(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = LeadportResult<Option<Lead>>> + Send;
    /// `Accepted -> Invoiced`, linking the invoice.
    fn mark_invoiced(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        invoice_id: Uuid,
    ) -> impl Future<Output = LeadportResult<Option<Lead>>> + Send;
    /// `Invoiced -> Paid`.
    fn mark_paid(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = LeadportResult<Option<Lead>>> + Send;
}

pub trait InvoiceRepository: Send + Sync {
    /// Fails with `AlreadyExists` if the lead already has an invoice.
    fn create(&self, input: CreateInvoice)
    -> impl Future<Output = LeadportResult<Invoice>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = LeadportResult<Invoice>> + Send;
    fn get_by_lead(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> impl Future<Output = LeadportResult<Option<Invoice>>> + Send;
    fn get_by_stripe_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = LeadportResult<Option<Invoice>>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: InvoiceFilter,
        pagination: Pagination,
    ) -> impl Future<Output = LeadportResult<PaginatedResult<Invoice>>> + Send;
    /// `Pending -> Paid`, recording the paying checkout session.
    ///
    /// Fails with `AlreadyExists` if another invoice already holds the
    /// session id.
    fn mark_paid(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        stripe_session_id: &str,
    ) -> impl Future<Output = LeadportResult<Option<Invoice>>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid)
    -> impl Future<Output = LeadportResult<()>> + Send;
}

pub trait PurchaseRepository: Send + Sync {
    /// Fails with `AlreadyExists` if a purchase already holds the session id.
    fn create(
        &self,
        input: CreatePurchase,
    ) -> impl Future<Output = LeadportResult<Purchase>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = LeadportResult<Purchase>> + Send;
    fn get_by_stripe_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = LeadportResult<Option<Purchase>>> + Send;
    /// The most recently created purchase still stored as `Active`.
    ///
    /// Does not look at `expires_at`; callers decide about expiry.
    fn find_active_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = LeadportResult<Option<Purchase>>> + Send;
    fn list_by_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = LeadportResult<Vec<Purchase>>> + Send;
    /// `Active -> Expired`.
    fn mark_expired(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = LeadportResult<Option<Purchase>>> + Send;
    /// `Active -> Cancelled`.
    fn cancel(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = LeadportResult<Option<Purchase>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_limit() {
        assert_eq!(Pagination::new(None, Some(10_000)).limit, Pagination::MAX_LIMIT);
        assert_eq!(Pagination::new(None, Some(0)).limit, 1);
        assert_eq!(Pagination::new(Some(20), None).offset, 20);
        assert_eq!(Pagination::new(None, None).limit, 50);
    }
}
