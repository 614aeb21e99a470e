//! Authenticated request context.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Verified identity attached to a request after authentication.
///
/// Passed explicitly into every handler and service call; nothing in the
/// workspace reads identity from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid, tenant_id: Uuid, role_id: Uuid) -> Self {
        Self {
            user_id,
            tenant_id,
            role_id,
        }
    }

    /// Same identity with a different role, used after a reassignment.
    pub fn with_role(self, role_id: Uuid) -> Self {
        Self { role_id, ..self }
    }
}
