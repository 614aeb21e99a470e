//! Password login: credential check, account and tenant status, access
//! token issuance and the login audit trail.

use cpadesk_core::error::{CpaError, CpaResult};
use cpadesk_core::models::audit::{AuditEventType, CreateAuditLogEntry};
use cpadesk_core::models::tenant::TenantStatus;
use cpadesk_core::models::user::{User, UserStatus};
use cpadesk_core::repository::{AuditLogRepository, TenantRepository, UserRepository};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token;

/// Input for the login flow.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub tenant_id: Uuid,
    pub email: String,
    pub password: String,
}

/// Successful login result.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutput {
    pub access_token: String,
    /// Always `"Bearer"`.
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub user_id: Uuid,
    pub role_id: Uuid,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<U, T, A> {
    user_repo: U,
    tenant_repo: T,
    audit_repo: A,
    config: AuthConfig,
}

impl<U, T, A> AuthService<U, T, A>
where
    U: UserRepository,
    T: TenantRepository,
    A: AuditLogRepository,
{
    pub fn new(user_repo: U, tenant_repo: T, audit_repo: A, config: AuthConfig) -> Self {
        Self {
            user_repo,
            tenant_repo,
            audit_repo,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate with email + password inside a tenant and issue an
    /// access token.
    ///
    /// Unknown emails and wrong passwords are indistinguishable to the
    /// caller. Account status is only revealed once the password matched.
    pub async fn login(&self, input: LoginInput) -> CpaResult<LoginOutput> {
        let user = match self
            .user_repo
            .get_by_email(input.tenant_id, &input.email)
            .await
        {
            Ok(user) => user,
            Err(CpaError::NotFound { .. }) => {
                password::verify_against_dummy(&input.password);
                self.record_failure(input.tenant_id, None, "unknown email")
                    .await;
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
            self.record_failure(input.tenant_id, Some(user.id), "wrong password")
                .await;
            return Err(AuthError::InvalidCredentials.into());
        }

        self.ensure_enabled(&user).await?;

        let access_token =
            token::issue_access_token(user.id, user.tenant_id, user.role_id, &self.config)?;

        self.audit(CreateAuditLogEntry {
            tenant_id: user.tenant_id,
            actor_id: Some(user.id),
            event_type: AuditEventType::LoginSucceeded,
            target_id: Some(user.id),
            metadata: None,
        })
        .await;

        info!(tenant_id = %user.tenant_id, user_id = %user.id, "User logged in");

        Ok(LoginOutput {
            access_token,
            token_type: "Bearer",
            expires_in: self.config.access_token_lifetime_secs,
            user_id: user.id,
            role_id: user.role_id,
        })
    }

    /// Both the account and its tenant must be active.
    async fn ensure_enabled(&self, user: &User) -> CpaResult<()> {
        let reason = match user.status {
            UserStatus::Active => None,
            UserStatus::Inactive => Some("account inactive"),
            UserStatus::Locked => Some("account locked"),
        };
        let reason = match reason {
            Some(reason) => Some(reason),
            None => {
                let tenant = self.tenant_repo.get_by_id(user.tenant_id).await?;
                (tenant.status == TenantStatus::Suspended).then_some("tenant suspended")
            }
        };

        match reason {
            None => Ok(()),
            Some(reason) => {
                self.record_failure(user.tenant_id, Some(user.id), reason)
                    .await;
                Err(AuthError::AccountDisabled.into())
            }
        }
    }

    async fn record_failure(&self, tenant_id: Uuid, user_id: Option<Uuid>, reason: &str) {
        warn!(%tenant_id, ?user_id, reason, "Login failed");
        self.audit(CreateAuditLogEntry {
            tenant_id,
            actor_id: user_id,
            event_type: AuditEventType::LoginFailed,
            target_id: user_id,
            metadata: Some(serde_json::json!({ "reason": reason })),
        })
        .await;
    }

    /// A failed audit write must not change the login outcome; it is
    /// logged instead.
    async fn audit(&self, entry: CreateAuditLogEntry) {
        let event = entry.event_type;
        if let Err(e) = self.audit_repo.append(entry).await {
            warn!(error = %e, event = event.as_str(), "Failed to write audit entry");
        }
    }
}
