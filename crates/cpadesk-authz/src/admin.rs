//! Entitlement administration inside the caller's tenant.
//!
//! Every write here invalidates the affected permission cache entry after
//! the store accepted it and appends an audit entry. Writes that bypass
//! this type must call [`PermissionCache::invalidate`] themselves.

use std::sync::Arc;

use cpadesk_core::AuthContext;
use cpadesk_core::error::{CpaError, CpaResult};
use cpadesk_core::models::audit::{AuditEventType, CreateAuditLogEntry};
use cpadesk_core::models::permission::Permission;
use cpadesk_core::models::role_permission::RolePermission;
use cpadesk_core::models::user::User;
use cpadesk_core::repository::{
    AuditLogRepository, PermissionRepository, RolePermissionRepository, RoleRepository,
    UserRepository,
};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::PermissionCache;
use crate::isolation::TenantGuard;

pub struct EntitlementAdmin<R, U, P, G, A> {
    guard: TenantGuard<R, U>,
    permissions: P,
    grants: G,
    audit: A,
    cache: Option<Arc<PermissionCache>>,
}

impl<R, U, P, G, A> EntitlementAdmin<R, U, P, G, A>
where
    R: RoleRepository,
    U: UserRepository,
    P: PermissionRepository,
    G: RolePermissionRepository,
    A: AuditLogRepository,
{
    pub fn new(
        guard: TenantGuard<R, U>,
        permissions: P,
        grants: G,
        audit: A,
        cache: Option<Arc<PermissionCache>>,
    ) -> Self {
        Self {
            guard,
            permissions,
            grants,
            audit,
            cache,
        }
    }

    pub fn guard(&self) -> &TenantGuard<R, U> {
        &self.guard
    }

    fn invalidate(&self, tenant_id: Uuid, role_id: Uuid) {
        if let Some(cache) = &self.cache {
            cache.invalidate(tenant_id, role_id);
        }
    }

    async fn record(
        &self,
        ctx: &AuthContext,
        event_type: AuditEventType,
        target_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) {
        let entry = CreateAuditLogEntry {
            tenant_id: ctx.tenant_id,
            actor_id: Some(ctx.user_id),
            event_type,
            target_id,
            metadata: Some(metadata),
        };
        if let Err(e) = self.audit.append(entry).await {
            warn!(error = %e, event = event_type.as_str(), "Failed to write audit entry");
        }
    }

    /// Audit a refused request. Outcomes other than `Forbidden` are not
    /// recorded.
    pub async fn record_denied(&self, ctx: &AuthContext, target_id: Option<Uuid>, err: &CpaError) {
        if let CpaError::Forbidden(kind) = err {
            self.record(
                ctx,
                AuditEventType::AccessDenied,
                target_id,
                json!({ "reason": kind.to_string() }),
            )
            .await;
        }
    }

    /// Permissions currently granted to a role of the caller's tenant.
    pub async fn role_permissions(
        &self,
        ctx: &AuthContext,
        role_id: Uuid,
    ) -> CpaResult<Vec<Permission>> {
        let role = self.guard.load_role(ctx, role_id).await?;
        self.grants.permissions_for_role(role.id).await
    }

    /// Grant the permission named `permission` to a role of the caller's
    /// tenant. A repeated grant fails with `AlreadyExists`.
    pub async fn grant(
        &self,
        ctx: &AuthContext,
        role_id: Uuid,
        permission: &str,
    ) -> CpaResult<RolePermission> {
        let role = self.guard.load_role(ctx, role_id).await?;
        let perm = self.permissions.get_by_name(permission).await?;

        let mapping = self
            .grants
            .grant(role.id, perm.id, Some(ctx.user_id))
            .await?;
        self.invalidate(ctx.tenant_id, role.id);

        self.record(
            ctx,
            AuditEventType::PermissionGranted,
            Some(role.id),
            json!({ "permission": perm.name, "permission_id": perm.id }),
        )
        .await;

        Ok(mapping)
    }

    /// Revoke a permission from a role. Returns `false` when the role did
    /// not hold it.
    pub async fn revoke(
        &self,
        ctx: &AuthContext,
        role_id: Uuid,
        permission: &str,
    ) -> CpaResult<bool> {
        let role = self.guard.load_role(ctx, role_id).await?;
        let perm = self.permissions.get_by_name(permission).await?;

        let removed = self.grants.revoke(role.id, perm.id).await?;
        self.invalidate(ctx.tenant_id, role.id);

        if removed {
            self.record(
                ctx,
                AuditEventType::PermissionRevoked,
                Some(role.id),
                json!({ "permission": perm.name, "permission_id": perm.id }),
            )
            .await;
        }

        Ok(removed)
    }

    /// Give a user of the caller's tenant a different role of the same
    /// tenant.
    pub async fn assign_role(
        &self,
        ctx: &AuthContext,
        user_id: Uuid,
        role_id: Uuid,
    ) -> CpaResult<User> {
        let user = self.guard.load_user(ctx, user_id).await?;
        let role = self.guard.load_role(ctx, role_id).await?;

        let updated = self
            .guard
            .users()
            .assign_role(ctx.tenant_id, user.id, role.id)
            .await?;

        self.record(
            ctx,
            AuditEventType::RoleAssigned,
            Some(user.id),
            json!({ "role_id": role.id, "previous_role_id": user.role_id }),
        )
        .await;

        Ok(updated)
    }

    /// Delete a role of the caller's tenant. Refused with `Conflict` while
    /// any user still holds it.
    pub async fn delete_role(&self, ctx: &AuthContext, role_id: Uuid) -> CpaResult<()> {
        let role = self.guard.load_role(ctx, role_id).await?;

        self.guard.roles().delete(ctx.tenant_id, role.id).await?;
        self.invalidate(ctx.tenant_id, role.id);

        info!(
            tenant_id = %ctx.tenant_id,
            role_id = %role.id,
            name = %role.name,
            "Role deleted"
        );

        self.record(
            ctx,
            AuditEventType::RoleDeleted,
            Some(role.id),
            json!({ "name": role.name }),
        )
        .await;

        Ok(())
    }
}
