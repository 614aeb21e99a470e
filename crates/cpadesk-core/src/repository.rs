//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter and never return rows owned by another
//! tenant.

use uuid::Uuid;

use crate::error::CpaResult;
use crate::models::{
    audit::{AuditLogEntry, CreateAuditLogEntry},
    permission::{CreatePermission, Permission, UpdatePermission},
    role::{CreateRole, Role, UpdateRole},
    role_permission::RolePermission,
    tenant::{CreateTenant, Tenant, UpdateTenant},
    user::{CreateUser, UpdateUser, User},
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

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Global scope
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = CpaResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CpaResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = CpaResult<Tenant>> + Send;
    /// Cascades to the tenant's grants, users and roles.
    fn delete(&self, id: Uuid) -> impl Future<Output = CpaResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = CpaResult<PaginatedResult<Tenant>>> + Send;
}

pub trait PermissionRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePermission,
    ) -> impl Future<Output = CpaResult<Permission>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CpaResult<Permission>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = CpaResult<Permission>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdatePermission,
    ) -> impl Future<Output = CpaResult<Permission>> + Send;
    /// Fails with `Conflict` while any role holds the permission.
    fn delete(&self, id: Uuid) -> impl Future<Output = CpaResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = CpaResult<PaginatedResult<Permission>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait RoleRepository: Send + Sync {
    fn create(&self, input: CreateRole) -> impl Future<Output = CpaResult<Role>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CpaResult<Role>> + Send;
    fn get_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> impl Future<Output = CpaResult<Role>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateRole,
    ) -> impl Future<Output = CpaResult<Role>> + Send;
    /// Fails with `Conflict` while any user holds the role; removes its
    /// grants otherwise.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CpaResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CpaResult<PaginatedResult<Role>>> + Send;

    /// Owning tenant of a role regardless of the caller's tenant.
    ///
    /// Only isolation enforcement should call this, to tell a foreign
    /// role apart from a missing one.
    fn owner_tenant(&self, id: Uuid) -> impl Future<Output = CpaResult<Option<Uuid>>> + Send;
}

pub trait UserRepository: Send + Sync {
    /// The role must belong to `input.tenant_id`.
    fn create(&self, input: CreateUser) -> impl Future<Output = CpaResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CpaResult<User>> + Send;
    fn get_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> impl Future<Output = CpaResult<User>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = CpaResult<User>> + Send;
    /// Replaces the user's single role with `role_id` of the same tenant.
    fn assign_role(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = CpaResult<User>> + Send;
    /// Soft-delete: sets status to Inactive.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CpaResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CpaResult<PaginatedResult<User>>> + Send;
    fn count_with_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = CpaResult<u64>> + Send;

    /// Owning tenant of a user regardless of the caller's tenant.
    fn owner_tenant(&self, id: Uuid) -> impl Future<Output = CpaResult<Option<Uuid>>> + Send;
}

pub trait RolePermissionRepository: Send + Sync {
    /// Create the `(role_id, permission_id)` mapping.
    ///
    /// A second grant of the same pair fails with `AlreadyExists` and
    /// leaves the existing mapping untouched.
    fn grant(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        granted_by: Option<Uuid>,
    ) -> impl Future<Output = CpaResult<RolePermission>> + Send;

    /// Remove the mapping. Returns `false` when it did not exist.
    fn revoke(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = CpaResult<bool>> + Send;

    fn list_for_role(
        &self,
        role_id: Uuid,
    ) -> impl Future<Output = CpaResult<Vec<RolePermission>>> + Send;

    fn permissions_for_role(
        &self,
        role_id: Uuid,
    ) -> impl Future<Output = CpaResult<Vec<Permission>>> + Send;
}

pub trait AuditLogRepository: Send + Sync {
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = CpaResult<AuditLogEntry>> + Send;
    /// Newest first.
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CpaResult<PaginatedResult<AuditLogEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Authorization read path
// ---------------------------------------------------------------------------

/// Read-only view of the entitlement data consumed by authorization.
///
/// Absence is reported as `Ok(None)`; errors are reserved for the store
/// itself failing.
pub trait EntitlementStore: Send + Sync {
    fn find_role_by_id(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = CpaResult<Option<Role>>> + Send;

    fn find_permissions_for_role(
        &self,
        role_id: Uuid,
    ) -> impl Future<Output = CpaResult<Vec<Permission>>> + Send;

    fn find_user_by_id(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = CpaResult<Option<User>>> + Send;

    fn find_tenant_by_id(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = CpaResult<Option<Tenant>>> + Send;
}
