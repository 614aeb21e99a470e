//! Domain models for cpadesk.
//!
//! Tenants own roles and users; permissions are global and reach roles
//! only through explicit [`role_permission::RolePermission`] mappings.

pub mod audit;
pub mod permission;
pub mod role;
pub mod role_permission;
pub mod tenant;
pub mod user;
