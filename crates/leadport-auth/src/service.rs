//! Authentication service — registration, login and session resolution.

use chrono::{DateTime, Duration, Utc};
use leadport_core::error::{LeadportError, LeadportResult};
use leadport_core::models::session::CreateSession;
use leadport_core::models::user::{CreateUser, Role, UpdateUser, User, UserStatus};
use leadport_core::repository::{
    PaginatedResult, Pagination, SessionRepository, TenantRepository, UserRepository,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::principal::AuthenticatedUser;
use crate::token;

/// Input for self-service registration.
#[derive(Debug)]
pub struct RegisterInput {
    pub tenant_slug: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
}

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub tenant_slug: String,
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    /// Raw opaque session token (return to client, not stored).
    pub session_token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<T: TenantRepository, U: UserRepository, S: SessionRepository> {
    tenant_repo: T,
    user_repo: U,
    session_repo: S,
    config: AuthConfig,
}

impl<T, U, S> AuthService<T, U, S>
where
    T: TenantRepository,
    U: UserRepository,
    S: SessionRepository,
{
    pub fn new(tenant_repo: T, user_repo: U, session_repo: S, config: AuthConfig) -> Self {
        Self {
            tenant_repo,
            user_repo,
            session_repo,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Self-service sign-up as a lead buyer or an agent.
    ///
    /// Administrators are only created through [`Self::provision`].
    pub async fn register(&self, input: RegisterInput) -> LeadportResult<User> {
        if input.role == Role::Admin {
            return Err(AuthError::RoleNotRegistrable("ADMIN").into());
        }

        let tenant = self.tenant_repo.get_by_slug(&input.tenant_slug).await?;

        self.provision(CreateUser {
            tenant_id: tenant.id,
            email: input.email,
            name: input.name,
            password: input.password,
            role: input.role,
        })
        .await
    }

    /// Create a user with any role after the same input checks as
    /// registration. Used by bootstrap.
    pub async fn provision(&self, input: CreateUser) -> LeadportResult<User> {
        password::check_email(&input.email)?;
        password::check_password_policy(&input.password, &self.config)?;
        if input.name.trim().is_empty() {
            return Err(LeadportError::validation("name is required"));
        }

        let user = self.user_repo.create(input).await?;
        info!(
            tenant_id = %user.tenant_id,
            user_id = %user.id,
            role = user.role.as_str(),
            "User registered"
        );
        Ok(user)
    }

    /// Verify credentials and open a session.
    ///
    /// An unknown tenant, an unknown email and a wrong password all
    /// produce the same `invalid credentials` error.
    pub async fn login(&self, input: LoginInput) -> LeadportResult<LoginOutput> {
        let tenant = match self.tenant_repo.get_by_slug(&input.tenant_slug).await {
            Ok(t) => t,
            Err(LeadportError::NotFound { .. }) => {
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let user = match self.user_repo.get_by_email(tenant.id, &input.email).await {
            Ok(u) => u,
            Err(LeadportError::NotFound { .. }) => {
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            warn!(tenant_id = %tenant.id, user_id = %user.id, "Login rejected: bad password");
            return Err(AuthError::InvalidCredentials.into());
        }

        if user.status == UserStatus::Disabled {
            return Err(AuthError::AccountDisabled.into());
        }

        let raw_token = token::generate_session_token();
        let expires_at = self.session_expiry()?;

        let session = self
            .session_repo
            .create(CreateSession {
                tenant_id: tenant.id,
                user_id: user.id,
                token_hash: token::hash_session_token(&raw_token),
                ip_address: input.ip_address,
                user_agent: input.user_agent,
                expires_at,
            })
            .await?;

        info!(tenant_id = %tenant.id, user_id = %user.id, session_id = %session.id, "User logged in");

        Ok(LoginOutput {
            session_token: raw_token,
            session_id: session.id,
            expires_at,
            user,
        })
    }

    /// Resolve a raw session token to the signed-in user.
    pub async fn authenticate(&self, raw_token: &str) -> LeadportResult<AuthenticatedUser> {
        let token_hash = token::hash_session_token(raw_token);
        let session = self
            .session_repo
            .get_by_token_hash(&token_hash)
            .await
            .map_err(|e| match e {
                LeadportError::NotFound { .. } => AuthError::SessionInvalid.into(),
                other => other,
            })?;

        if session.is_expired_at(Utc::now()) {
            if let Err(e) = self
                .session_repo
                .invalidate(session.tenant_id, session.id)
                .await
            {
                warn!(session_id = %session.id, error = %e, "Failed to drop expired session");
            }
            return Err(AuthError::SessionExpired.into());
        }

        let user = self
            .user_repo
            .get_by_id(session.tenant_id, session.user_id)
            .await
            .map_err(|e| match e {
                LeadportError::NotFound { .. } => AuthError::SessionInvalid.into(),
                other => other,
            })?;

        if user.status == UserStatus::Disabled {
            return Err(AuthError::AccountDisabled.into());
        }

        Ok(AuthenticatedUser {
            user_id: user.id,
            tenant_id: user.tenant_id,
            session_id: session.id,
            email: user.email,
            name: user.name,
            role: user.role,
        })
    }

    /// Invalidate a single session (logout).
    pub async fn logout(&self, principal: &AuthenticatedUser) -> LeadportResult<()> {
        self.session_repo
            .invalidate(principal.tenant_id, principal.session_id)
            .await?;
        info!(user_id = %principal.user_id, session_id = %principal.session_id, "User logged out");
        Ok(())
    }

    /// Revoke all sessions for a user (e.g. when an admin disables them).
    pub async fn revoke_all_sessions(&self, tenant_id: Uuid, user_id: Uuid) -> LeadportResult<()> {
        self.session_repo
            .invalidate_user_sessions(tenant_id, user_id)
            .await
    }

    /// Drop expired sessions across all tenants.
    pub async fn purge_expired_sessions(&self) -> LeadportResult<u64> {
        self.session_repo.purge_expired().await
    }

    // -------------------------------------------------------------------
    // User administration
    // -------------------------------------------------------------------

    pub async fn list_users(
        &self,
        actor: &AuthenticatedUser,
        role: Option<Role>,
        pagination: Pagination,
    ) -> LeadportResult<PaginatedResult<User>> {
        actor.require_admin()?;
        self.user_repo.list(actor.tenant_id, role, pagination).await
    }

    /// Change a user's name, role or status.
    ///
    /// Admins cannot demote or disable themselves. Disabling a user ends
    /// all of their sessions.
    pub async fn update_user(
        &self,
        actor: &AuthenticatedUser,
        user_id: Uuid,
        input: UpdateUser,
    ) -> LeadportResult<User> {
        actor.require_admin()?;
        if input.name.is_none() && input.role.is_none() && input.status.is_none() {
            return Err(LeadportError::validation("no changes supplied"));
        }
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(LeadportError::validation("name is required"));
        }
        if user_id == actor.user_id
            && (input.role.is_some_and(|r| r != Role::Admin)
                || input.status == Some(UserStatus::Disabled))
        {
            return Err(LeadportError::conflict(
                "admins cannot demote or disable themselves",
            ));
        }

        let user = self
            .user_repo
            .update(actor.tenant_id, user_id, input)
            .await?;
        if user.status == UserStatus::Disabled {
            self.revoke_all_sessions(user.tenant_id, user.id).await?;
        }

        info!(
            tenant_id = %user.tenant_id,
            user_id = %user.id,
            role = user.role.as_str(),
            status = user.status.as_str(),
            by = %actor.user_id,
            "User updated"
        );
        Ok(user)
    }

    /// Expiry for a session issued now. Lifetimes beyond chrono's range
    /// are a configuration fault, not a panic.
    fn session_expiry(&self) -> LeadportResult<DateTime<Utc>> {
        let secs = self.config.session_lifetime_secs;
        i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                LeadportError::Internal(format!("session lifetime of {secs}s is out of range"))
            })
    }
}
