//! The authorization decision: does the caller's role hold every
//! required permission?

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cpadesk_core::AuthContext;
use cpadesk_core::error::{CpaError, CpaResult};
use cpadesk_core::repository::EntitlementStore;
use tracing::{debug, warn};

use crate::cache::{PermissionCache, PermissionSet};
use crate::config::AuthzConfig;

/// Allow/deny decisions over an [`EntitlementStore`].
///
/// Stateless per request apart from the optional shared cache.
pub struct AuthorizationGate<S> {
    pub(crate) store: S,
    cache: Option<Arc<PermissionCache>>,
    pub(crate) timeout: Duration,
}

impl<S: EntitlementStore> AuthorizationGate<S> {
    /// Gate with a private cache when `config.cache_enabled` is set.
    pub fn new(store: S, config: &AuthzConfig) -> Self {
        let cache = config
            .cache_enabled
            .then(|| Arc::new(PermissionCache::new()));
        Self {
            store,
            cache,
            timeout: config.store_timeout,
        }
    }

    /// Gate sharing `cache` with whoever invalidates it.
    pub fn with_cache(store: S, cache: Arc<PermissionCache>, config: &AuthzConfig) -> Self {
        Self {
            store,
            cache: Some(cache),
            timeout: config.store_timeout,
        }
    }

    pub fn cache(&self) -> Option<&Arc<PermissionCache>> {
        self.cache.as_ref()
    }

    /// Run one store call under the configured timeout.
    pub(crate) async fn bounded<T>(
        &self,
        call: impl Future<Output = CpaResult<T>>,
    ) -> CpaResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Entitlement store timed out");
                Err(CpaError::TransientStore(format!(
                    "entitlement store did not answer within {:?}",
                    self.timeout
                )))
            }
        }
    }

    /// Permission names granted to the caller's role.
    ///
    /// The role must belong to the caller's tenant; otherwise it is
    /// reported as not found.
    pub async fn permissions_for(&self, ctx: &AuthContext) -> CpaResult<PermissionSet> {
        if let Some(cached) = self
            .cache
            .as_ref()
            .and_then(|c| c.get(ctx.tenant_id, ctx.role_id))
        {
            return Ok(cached);
        }

        let seen_epoch = self.cache.as_ref().map(|c| c.epoch());

        let role = self
            .bounded(self.store.find_role_by_id(ctx.tenant_id, ctx.role_id))
            .await?
            .ok_or_else(|| CpaError::not_found("role", ctx.role_id))?;

        let names: HashSet<String> = self
            .bounded(self.store.find_permissions_for_role(role.id))
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        let names = Arc::new(names);

        debug!(
            tenant_id = %ctx.tenant_id,
            role_id = %ctx.role_id,
            count = names.len(),
            "Resolved role permissions"
        );

        if let (Some(cache), Some(epoch)) = (&self.cache, seen_epoch) {
            cache.insert(ctx.tenant_id, ctx.role_id, Arc::clone(&names), epoch);
        }

        Ok(names)
    }

    /// Allow only if the role holds ALL of `required`.
    ///
    /// Fails with `Forbidden(MissingPermission)` naming the first required
    /// permission that is absent. An empty `required` list still checks
    /// that the role exists in the caller's tenant.
    pub async fn authorize(&self, ctx: &AuthContext, required: &[&str]) -> CpaResult<()> {
        let granted = self.permissions_for(ctx).await?;

        if let Some(missing) = required.iter().find(|name| !granted.contains(**name)) {
            warn!(
                tenant_id = %ctx.tenant_id,
                user_id = %ctx.user_id,
                role_id = %ctx.role_id,
                permission = *missing,
                "Access denied"
            );
            return Err(CpaError::missing_permission(*missing));
        }

        Ok(())
    }
}
