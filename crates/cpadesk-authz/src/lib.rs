//! cpadesk authz: the authorization gate, its permission cache, tenant
//! isolation and entitlement administration.

pub mod admin;
pub mod cache;
pub mod config;
pub mod gate;
pub mod isolation;
mod subject;

pub use admin::EntitlementAdmin;
pub use cache::{PermissionCache, PermissionSet};
pub use config::AuthzConfig;
pub use gate::AuthorizationGate;
pub use isolation::{TenantGuard, ensure_owned};
