//! Role to permission mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One grant of a permission to a role.
///
/// The `(role_id, permission_id)` pair is unique. Mappings are created by
/// a grant and removed by a revoke; they are never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
    /// User who made the grant, if it was made on behalf of one.
    pub granted_by: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
}
