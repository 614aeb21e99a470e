//! Shared application state handed to every handler.

use std::sync::Arc;

use cpadesk_auth::{AuthConfig, AuthService};
use cpadesk_authz::{
    AuthorizationGate, AuthzConfig, EntitlementAdmin, PermissionCache, TenantGuard,
};
use cpadesk_core::AuthContext;
use cpadesk_core::error::CpaResult;
use cpadesk_db::repository::{
    SurrealAuditLogRepository, SurrealEntitlementStore, SurrealPermissionRepository,
    SurrealRolePermissionRepository, SurrealRoleRepository, SurrealTenantRepository,
    SurrealUserRepository,
};
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::error::ApiError;

pub type Auth<C> = AuthService<
    SurrealUserRepository<C>,
    SurrealTenantRepository<C>,
    SurrealAuditLogRepository<C>,
>;

pub type Admin<C> = EntitlementAdmin<
    SurrealRoleRepository<C>,
    SurrealUserRepository<C>,
    SurrealPermissionRepository<C>,
    SurrealRolePermissionRepository<C>,
    SurrealAuditLogRepository<C>,
>;

struct Inner<C: Connection> {
    db: Surreal<C>,
    auth: Auth<C>,
    gate: AuthorizationGate<SurrealEntitlementStore<C>>,
    admin: Admin<C>,
}

pub struct AppState<C: Connection> {
    inner: Arc<Inner<C>>,
}

// Derived Clone would require `C: Clone`.
impl<C: Connection> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> AppState<C> {
    /// Wire the services over one database handle. The gate and the admin
    /// share a single permission cache.
    pub fn new(db: Surreal<C>, auth_config: AuthConfig, authz_config: &AuthzConfig) -> Self {
        let users = || match &auth_config.pepper {
            Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper.clone()),
            None => SurrealUserRepository::new(db.clone()),
        };

        let cache = authz_config
            .cache_enabled
            .then(|| Arc::new(PermissionCache::new()));
        let store = SurrealEntitlementStore::new(db.clone());
        let gate = match &cache {
            Some(cache) => AuthorizationGate::with_cache(store, Arc::clone(cache), authz_config),
            None => AuthorizationGate::new(store, authz_config),
        };

        let admin = EntitlementAdmin::new(
            TenantGuard::new(SurrealRoleRepository::new(db.clone()), users()),
            SurrealPermissionRepository::new(db.clone()),
            SurrealRolePermissionRepository::new(db.clone()),
            SurrealAuditLogRepository::new(db.clone()),
            cache,
        );

        let auth = AuthService::new(
            users(),
            SurrealTenantRepository::new(db.clone()),
            SurrealAuditLogRepository::new(db.clone()),
            auth_config,
        );

        Self {
            inner: Arc::new(Inner {
                db,
                auth,
                gate,
                admin,
            }),
        }
    }

    pub fn db(&self) -> &Surreal<C> {
        &self.inner.db
    }

    pub fn auth(&self) -> &Auth<C> {
        &self.inner.auth
    }

    pub fn gate(&self) -> &AuthorizationGate<SurrealEntitlementStore<C>> {
        &self.inner.gate
    }

    pub fn admin(&self) -> &Admin<C> {
        &self.inner.admin
    }

    /// Check `required` for the caller and audit the refusal, if any.
    pub async fn authorize(
        &self,
        ctx: &AuthContext,
        required: &[&str],
        target_id: Option<Uuid>,
    ) -> Result<(), ApiError> {
        let result = self.gate().authorize(ctx, required).await;
        self.audited(ctx, target_id, result).await
    }

    /// Pass `result` through, auditing it first if it is a refusal.
    pub async fn audited<T>(
        &self,
        ctx: &AuthContext,
        target_id: Option<Uuid>,
        result: CpaResult<T>,
    ) -> Result<T, ApiError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.admin().record_denied(ctx, target_id, &err).await;
                Err(err.into())
            }
        }
    }
}
