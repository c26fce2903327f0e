//! Lead domain model and its lifecycle states.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// Lifecycle of a lead.
///
/// `New -> Pending -> Accepted -> Invoiced -> Paid`, plus the single
/// backwards edge `Pending -> New` when the assignee declines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeadStatus {
    New,
    Pending,
    Accepted,
    Invoiced,
    Paid,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::Pending => "PENDING",
            LeadStatus::Accepted => "ACCEPTED",
            LeadStatus::Invoiced => "INVOICED",
            LeadStatus::Paid => "PAID",
        }
    }

    /// Whether `self -> next` is an edge of the lifecycle.
    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        matches!(
            (self, next),
            (LeadStatus::New, LeadStatus::Pending)
                | (LeadStatus::Pending, LeadStatus::Accepted)
                | (LeadStatus::Pending, LeadStatus::New)
                | (LeadStatus::Accepted, LeadStatus::Invoiced)
                | (LeadStatus::Invoiced, LeadStatus::Paid)
        )
    }
}

impl FromStr for LeadStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(LeadStatus::New),
            "PENDING" => Ok(LeadStatus::Pending),
            "ACCEPTED" => Ok(LeadStatus::Accepted),
            "INVOICED" => Ok(LeadStatus::Invoiced),
            "PAID" => Ok(LeadStatus::Paid),
            other => Err(UnknownVariant {
                kind: "lead status",
                value: other.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub notes: Option<String>,
    pub status: LeadStatus,
    /// The agent who submitted the lead.
    pub agent_id: Uuid,
    pub assigned_user_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLead {
    pub tenant_id: Uuid,
    pub agent_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub notes: Option<String>,
}

/// Contact fields an admin or the owning agent may edit.
///
/// Status and assignment are never changed through this type; they only
/// move through the guarded transitions on [`LeadRepository`].
///
/// [`LeadRepository`]: crate::repository::LeadRepository
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateLead {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `Some(Some(v))` = set, `Some(None)` = clear, `None` = no change.
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub job_title: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

impl UpdateLead {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.company.is_none()
            && self.job_title.is_none()
            && self.notes.is_none()
    }
}

/// Filters for lead listings. All set fields must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub agent_id: Option<Uuid>,
    pub assigned_user_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_edges_are_allowed() {
        assert!(LeadStatus::New.can_transition_to(LeadStatus::Pending));
        assert!(LeadStatus::Pending.can_transition_to(LeadStatus::Accepted));
        assert!(LeadStatus::Accepted.can_transition_to(LeadStatus::Invoiced));
        assert!(LeadStatus::Invoiced.can_transition_to(LeadStatus::Paid));
    }

    #[test]
    fn decline_is_the_only_backward_edge() {
        assert!(LeadStatus::Pending.can_transition_to(LeadStatus::New));
        assert!(!LeadStatus::Accepted.can_transition_to(LeadStatus::New));
        assert!(!LeadStatus::Paid.can_transition_to(LeadStatus::Invoiced));
        assert!(!LeadStatus::New.can_transition_to(LeadStatus::Accepted));
    }

    #[test]
    fn status_parses_storage_form() {
        assert_eq!("INVOICED".parse::<LeadStatus>().unwrap(), LeadStatus::Invoiced);
        assert!("invoiced".parse::<LeadStatus>().is_err());
    }
}
