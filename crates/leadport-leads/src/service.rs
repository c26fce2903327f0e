//! Lead service — visibility rules and guarded lifecycle transitions.
//!
//! Every transition is a single conditional write in the repository. When
//! it matches nothing the lead is re-read only to tell "gone or hidden"
//! (404) apart from "wrong state" (409).

use chrono::Utc;
use leadport_auth::AuthenticatedUser;
use leadport_auth::password::check_email;
use leadport_billing::subscription;
use leadport_core::error::{LeadportError, LeadportResult};
use leadport_core::models::invoice::{CreateInvoice, Invoice, InvoiceFilter};
use leadport_core::models::lead::{CreateLead, Lead, LeadFilter, LeadStatus, UpdateLead};
use leadport_core::models::user::{Role, UserStatus};
use leadport_core::repository::{
    InvoiceRepository, LeadRepository, PaginatedResult, Pagination, PurchaseRepository,
    UserRepository,
};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::LeadsConfig;

/// What an agent supplies when capturing a lead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitLead {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Lead service.
///
/// Generic over repository implementations. Purchases are only read to
/// check the assignee's subscription.
pub struct LeadService<L, I, U, P>
where
    L: LeadRepository,
    I: InvoiceRepository,
    U: UserRepository,
    P: PurchaseRepository,
{
    leads: L,
    invoices: I,
    users: U,
    purchases: P,
    config: LeadsConfig,
}

impl<L, I, U, P> LeadService<L, I, U, P>
where
    L: LeadRepository,
    I: InvoiceRepository,
    U: UserRepository,
    P: PurchaseRepository,
{
    pub fn new(leads: L, invoices: I, users: U, purchases: P, config: LeadsConfig) -> Self {
        Self {
            leads,
            invoices,
            users,
            purchases,
            config,
        }
    }

    /// Capture a new lead owned by the calling agent.
    pub async fn submit(&self, actor: &AuthenticatedUser, input: SubmitLead) -> LeadportResult<Lead> {
        actor.require_agent()?;

        let first_name = required("first name", &input.first_name)?;
        let last_name = required("last name", &input.last_name)?;
        let email = clean(input.email);
        let phone = clean(input.phone);
        check_contact(email.as_deref(), phone.as_deref())?;

        let lead = self
            .leads
            .create(CreateLead {
                tenant_id: actor.tenant_id,
                agent_id: actor.user_id,
                first_name,
                last_name,
                email,
                phone,
                company: clean(input.company),
                job_title: clean(input.job_title),
                notes: clean(input.notes),
            })
            .await?;

        info!(
            tenant_id = %lead.tenant_id,
            lead_id = %lead.id,
            agent_id = %lead.agent_id,
            "Lead submitted"
        );
        Ok(lead)
    }

    pub async fn get(&self, actor: &AuthenticatedUser, id: Uuid) -> LeadportResult<Lead> {
        let lead = self.leads.get_by_id(actor.tenant_id, id).await?;
        if can_see(actor, &lead) {
            Ok(lead)
        } else {
            Err(LeadportError::not_found("lead", id))
        }
    }

    /// List leads visible to `actor`. Non-admins have the filter narrowed
    /// to their own leads regardless of what they asked for.
    pub async fn list(
        &self,
        actor: &AuthenticatedUser,
        mut filter: LeadFilter,
        pagination: Pagination,
    ) -> LeadportResult<PaginatedResult<Lead>> {
        match actor.role {
            Role::Admin => {}
            Role::Agent => filter.agent_id = Some(actor.user_id),
            Role::User => filter.assigned_user_id = Some(actor.user_id),
        }
        self.leads.list(actor.tenant_id, filter, pagination).await
    }

    /// Edit contact details. Agents may only edit their own leads while
    /// they are still `New`.
    pub async fn update_details(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        patch: UpdateLead,
    ) -> LeadportResult<Lead> {
        actor.require_agent()?;
        if patch.is_empty() {
            return Err(LeadportError::validation("no changes supplied"));
        }

        let lead = self.get(actor, id).await?;
        if !actor.is_admin() && lead.status != LeadStatus::New {
            return Err(LeadportError::conflict(format!(
                "lead is {} and can no longer be edited",
                lead.status.as_str()
            )));
        }

        let patch = normalize_patch(patch)?;
        let email = match &patch.email {
            Some(next) => next.as_deref(),
            None => lead.email.as_deref(),
        };
        let phone = match &patch.phone {
            Some(next) => next.as_deref(),
            None => lead.phone.as_deref(),
        };
        check_contact(email, phone)?;

        // Agents race assignment; the write re-checks the status.
        let expected = (!actor.is_admin()).then_some(LeadStatus::New);
        let Some(updated) = self
            .leads
            .update_details(actor.tenant_id, id, patch, expected)
            .await?
        else {
            return Err(self.rejected(actor, id, "lead can no longer be edited").await);
        };
        info!(tenant_id = %actor.tenant_id, lead_id = %id, by = %actor.user_id, "Lead updated");
        Ok(updated)
    }

    /// Delete a lead that was never assigned.
    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> LeadportResult<()> {
        actor.require_admin()?;

        if self.leads.delete_new(actor.tenant_id, id).await? {
            info!(tenant_id = %actor.tenant_id, lead_id = %id, "Lead deleted");
            return Ok(());
        }
        Err(self
            .rejected(actor, id, "only NEW leads can be deleted")
            .await)
    }

    /// `New -> Pending` for a subscribed, active user.
    pub async fn assign(
        &self,
        actor: &AuthenticatedUser,
        lead_id: Uuid,
        user_id: Uuid,
    ) -> LeadportResult<Lead> {
        actor.require_admin()?;

        let assignee = match self.users.get_by_id(actor.tenant_id, user_id).await {
            Ok(user) => user,
            Err(LeadportError::NotFound { .. }) => {
                return Err(LeadportError::validation("assignee does not exist"));
            }
            Err(e) => return Err(e),
        };
        if assignee.role != Role::User {
            return Err(LeadportError::validation(
                "leads can only be assigned to users",
            ));
        }
        if assignee.status != UserStatus::Active {
            return Err(LeadportError::validation("assignee account is disabled"));
        }

        let subscribed =
            subscription::current_subscription(&self.purchases, actor.tenant_id, user_id, Utc::now())
                .await?;
        if subscribed.is_none() {
            return Err(LeadportError::conflict(
                "assignee has no active subscription",
            ));
        }

        match self.leads.assign(actor.tenant_id, lead_id, user_id).await? {
            Some(lead) => {
                info!(
                    tenant_id = %actor.tenant_id,
                    lead_id = %lead_id,
                    user_id = %user_id,
                    "Lead assigned"
                );
                Ok(lead)
            }
            None => Err(self
                .rejected(actor, lead_id, "only NEW leads can be assigned")
                .await),
        }
    }

    /// `Pending -> Accepted` by the assignee.
    pub async fn accept(&self, actor: &AuthenticatedUser, lead_id: Uuid) -> LeadportResult<Lead> {
        actor.require_user()?;

        match self
            .leads
            .accept(actor.tenant_id, lead_id, actor.user_id)
            .await?
        {
            Some(lead) => {
                info!(tenant_id = %actor.tenant_id, lead_id = %lead_id, user_id = %actor.user_id, "Lead accepted");
                Ok(lead)
            }
            None => Err(self
                .rejected(actor, lead_id, "only PENDING leads can be accepted")
                .await),
        }
    }

    /// `Pending -> New` by the assignee; the lead goes back to the pool.
    pub async fn decline(&self, actor: &AuthenticatedUser, lead_id: Uuid) -> LeadportResult<Lead> {
        actor.require_user()?;

        match self
            .leads
            .decline(actor.tenant_id, lead_id, actor.user_id)
            .await?
        {
            Some(lead) => {
                info!(tenant_id = %actor.tenant_id, lead_id = %lead_id, user_id = %actor.user_id, "Lead declined");
                Ok(lead)
            }
            None => Err(self
                .rejected(actor, lead_id, "only PENDING leads can be declined")
                .await),
        }
    }

    /// Bill the assignee of an accepted lead: `Accepted -> Invoiced`.
    ///
    /// The invoice row is inserted first; if the lead then fails its
    /// guard, the invoice is removed again.
    pub async fn create_invoice(
        &self,
        actor: &AuthenticatedUser,
        lead_id: Uuid,
        amount_cents: i64,
    ) -> LeadportResult<Invoice> {
        actor.require_admin()?;
        if amount_cents <= 0 {
            return Err(LeadportError::validation("amount must be positive"));
        }

        let lead = self.leads.get_by_id(actor.tenant_id, lead_id).await?;
        if lead.status != LeadStatus::Accepted {
            return Err(LeadportError::conflict(format!(
                "only ACCEPTED leads can be invoiced; lead is {}",
                lead.status.as_str()
            )));
        }
        let Some(user_id) = lead.assigned_user_id else {
            return Err(LeadportError::Internal(format!(
                "accepted lead {lead_id} has no assignee"
            )));
        };

        let invoice = self
            .invoices
            .create(CreateInvoice {
                tenant_id: actor.tenant_id,
                lead_id,
                user_id,
                amount_cents,
                currency: self.config.currency.clone(),
            })
            .await?;

        match self
            .leads
            .mark_invoiced(actor.tenant_id, lead_id, invoice.id)
            .await
        {
            Ok(Some(_)) => {
                info!(
                    tenant_id = %actor.tenant_id,
                    lead_id = %lead_id,
                    invoice_id = %invoice.id,
                    amount_cents,
                    "Lead invoiced"
                );
                Ok(invoice)
            }
            Ok(None) => {
                self.discard_invoice(&invoice).await;
                Err(LeadportError::conflict("lead changed while invoicing"))
            }
            Err(e) => {
                self.discard_invoice(&invoice).await;
                Err(e)
            }
        }
    }

    /// Admins see every invoice; users only their own.
    pub async fn list_invoices(
        &self,
        actor: &AuthenticatedUser,
        mut filter: InvoiceFilter,
        pagination: Pagination,
    ) -> LeadportResult<PaginatedResult<Invoice>> {
        actor.require_user()?;
        if !actor.is_admin() {
            filter.user_id = Some(actor.user_id);
        }
        self.invoices.list(actor.tenant_id, filter, pagination).await
    }

    /// The error for a guarded write that matched nothing.
    async fn rejected(
        &self,
        actor: &AuthenticatedUser,
        lead_id: Uuid,
        reason: &str,
    ) -> LeadportError {
        match self.leads.get_by_id(actor.tenant_id, lead_id).await {
            Ok(lead) if can_see(actor, &lead) => {
                warn!(
                    lead_id = %lead_id,
                    status = lead.status.as_str(),
                    by = %actor.user_id,
                    "Lead transition rejected"
                );
                LeadportError::conflict(format!("{reason}; lead is {}", lead.status.as_str()))
            }
            Ok(_) => LeadportError::not_found("lead", lead_id),
            Err(e) => e,
        }
    }

    async fn discard_invoice(&self, invoice: &Invoice) {
        match self.invoices.delete(invoice.tenant_id, invoice.id).await {
            Ok(()) => warn!(invoice_id = %invoice.id, lead_id = %invoice.lead_id, "Invoice rolled back"),
            Err(e) => error!(
                invoice_id = %invoice.id,
                lead_id = %invoice.lead_id,
                error = %e,
                "Failed to remove orphaned invoice"
            ),
        }
    }
}

fn can_see(actor: &AuthenticatedUser, lead: &Lead) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Agent => lead.agent_id == actor.user_id,
        Role::User => lead.assigned_user_id == Some(actor.user_id),
    }
}

fn required(field: &str, value: &str) -> LeadportResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LeadportError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Trim, and treat blank as absent.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_contact(email: Option<&str>, phone: Option<&str>) -> LeadportResult<()> {
    if email.is_none() && phone.is_none() {
        return Err(LeadportError::validation("email or phone is required"));
    }
    if let Some(email) = email {
        check_email(email)?;
    }
    if let Some(phone) = phone {
        check_phone(phone)?;
    }
    Ok(())
}

/// Digits with the usual separators, at least seven digits.
fn check_phone(phone: &str) -> LeadportResult<()> {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if allowed && (7..=20).contains(&digits) {
        Ok(())
    } else {
        Err(LeadportError::validation("phone number is invalid"))
    }
}

fn normalize_patch(patch: UpdateLead) -> LeadportResult<UpdateLead> {
    Ok(UpdateLead {
        first_name: patch
            .first_name
            .map(|v| required("first name", &v))
            .transpose()?,
        last_name: patch
            .last_name
            .map(|v| required("last name", &v))
            .transpose()?,
        email: patch.email.map(clean),
        phone: patch.phone.map(clean),
        company: patch.company.map(clean),
        job_title: patch.job_title.map(clean),
        notes: patch.notes.map(clean),
    })
}
