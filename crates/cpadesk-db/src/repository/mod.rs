//! SurrealDB repository implementations.

mod audit;
mod entitlement;
mod permission;
mod role;
mod role_permission;
mod tenant;
mod user;

pub use audit::SurrealAuditLogRepository;
pub use entitlement::SurrealEntitlementStore;
pub use permission::SurrealPermissionRepository;
pub use role::SurrealRoleRepository;
pub use role_permission::SurrealRolePermissionRepository;
pub use tenant::SurrealTenantRepository;
pub use user::{SurrealUserRepository, hash_password};
