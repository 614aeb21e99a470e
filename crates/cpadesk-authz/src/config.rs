//! Authorization configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Upper bound on a single entitlement store call. Exceeding it fails
    /// the decision with `TransientStore`.
    pub store_timeout: Duration,
    /// Cache resolved permission sets per (tenant, role).
    pub cache_enabled: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(2),
            cache_enabled: true,
        }
    }
}
