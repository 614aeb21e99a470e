//! Tenant isolation for role and user access.
//!
//! Reads are always filtered by the caller's tenant. When the filtered
//! read finds nothing, the unscoped owner lookup decides between
//! `NotFound` (no such record anywhere) and `Forbidden(CrossTenantAccess)`
//! (the record exists in another tenant).

use cpadesk_core::AuthContext;
use cpadesk_core::error::{CpaError, CpaResult};
use cpadesk_core::models::role::Role;
use cpadesk_core::models::user::User;
use cpadesk_core::repository::{RoleRepository, UserRepository};
use tracing::warn;
use uuid::Uuid;

/// Fail with `CrossTenantAccess` unless `owner` is the caller's tenant.
pub fn ensure_owned(ctx: &AuthContext, owner: Uuid) -> CpaResult<()> {
    if owner == ctx.tenant_id {
        return Ok(());
    }
    warn!(
        tenant_id = %ctx.tenant_id,
        user_id = %ctx.user_id,
        owner_tenant = %owner,
        "Cross-tenant access refused"
    );
    Err(CpaError::cross_tenant())
}

pub struct TenantGuard<R, U> {
    roles: R,
    users: U,
}

impl<R: RoleRepository, U: UserRepository> TenantGuard<R, U> {
    pub fn new(roles: R, users: U) -> Self {
        Self { roles, users }
    }

    pub fn roles(&self) -> &R {
        &self.roles
    }

    pub fn users(&self) -> &U {
        &self.users
    }

    pub async fn load_role(&self, ctx: &AuthContext, role_id: Uuid) -> CpaResult<Role> {
        match self.roles.get_by_id(ctx.tenant_id, role_id).await {
            Err(CpaError::NotFound { entity, id }) => {
                if let Some(owner) = self.roles.owner_tenant(role_id).await? {
                    ensure_owned(ctx, owner)?;
                }
                Err(CpaError::NotFound { entity, id })
            }
            other => other,
        }
    }

    pub async fn load_user(&self, ctx: &AuthContext, user_id: Uuid) -> CpaResult<User> {
        match self.users.get_by_id(ctx.tenant_id, user_id).await {
            Err(CpaError::NotFound { entity, id }) => {
                if let Some(owner) = self.users.owner_tenant(user_id).await? {
                    ensure_owned(ctx, owner)?;
                }
                Err(CpaError::NotFound { entity, id })
            }
            other => other,
        }
    }
}
