//! The authenticated caller and role guards.

use leadport_core::error::LeadportResult;
use leadport_core::models::user::Role;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AuthError;

/// A user resolved from a live session.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    #[serde(skip)]
    pub session_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins only.
    pub fn require_admin(&self) -> LeadportResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AuthError::RoleRequired("admin").into())
        }
    }

    /// Agents, or admins acting for them.
    pub fn require_agent(&self) -> LeadportResult<()> {
        match self.role {
            Role::Agent | Role::Admin => Ok(()),
            Role::User => Err(AuthError::RoleRequired("agent").into()),
        }
    }

    /// Users (lead buyers), or admins.
    pub fn require_user(&self) -> LeadportResult<()> {
        match self.role {
            Role::User | Role::Admin => Ok(()),
            Role::Agent => Err(AuthError::RoleRequired("user").into()),
        }
    }
}
