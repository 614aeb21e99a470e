//! [`EntitlementStore`] backed by SurrealDB: the read path used by
//! authorization.

use cpadesk_core::error::CpaResult;
use cpadesk_core::models::permission::Permission;
use cpadesk_core::models::role::Role;
use cpadesk_core::models::tenant::Tenant;
use cpadesk_core::models::user::User;
use cpadesk_core::repository::EntitlementStore;
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::repository::role::find_role;
use crate::repository::role_permission::permissions_of_role;
use crate::repository::tenant::find_tenant;
use crate::repository::user::find_user;

#[derive(Clone)]
pub struct SurrealEntitlementStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealEntitlementStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> EntitlementStore for SurrealEntitlementStore<C> {
    async fn find_role_by_id(&self, tenant_id: Uuid, role_id: Uuid) -> CpaResult<Option<Role>> {
        Ok(find_role(&self.db, tenant_id, role_id).await?)
    }

    async fn find_permissions_for_role(&self, role_id: Uuid) -> CpaResult<Vec<Permission>> {
        Ok(permissions_of_role(&self.db, role_id).await?)
    }

    async fn find_user_by_id(&self, tenant_id: Uuid, user_id: Uuid) -> CpaResult<Option<User>> {
        Ok(find_user(&self.db, tenant_id, user_id).await?)
    }

    async fn find_tenant_by_id(&self, tenant_id: Uuid) -> CpaResult<Option<Tenant>> {
        Ok(find_tenant(&self.db, tenant_id).await?)
    }
}
