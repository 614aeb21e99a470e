//! Re-validation of a token's subject against the store.

use cpadesk_core::AuthContext;
use cpadesk_core::error::{CpaError, CpaResult, UnauthorizedKind};
use cpadesk_core::models::tenant::TenantStatus;
use cpadesk_core::models::user::UserStatus;
use cpadesk_core::repository::EntitlementStore;
use tracing::warn;

use crate::gate::AuthorizationGate;

impl<S: EntitlementStore> AuthorizationGate<S> {
    /// Confirm the token subject and its tenant still exist and are active,
    /// and return the context carrying the user's current role.
    ///
    /// A role reassignment therefore takes effect on the next request
    /// without re-issuing the token.
    pub async fn verify_subject(&self, ctx: AuthContext) -> CpaResult<AuthContext> {
        let user = self
            .bounded(self.store.find_user_by_id(ctx.tenant_id, ctx.user_id))
            .await?;

        let Some(user) = user else {
            warn!(
                tenant_id = %ctx.tenant_id,
                user_id = %ctx.user_id,
                "Token subject no longer exists"
            );
            return Err(CpaError::Unauthorized(UnauthorizedKind::InvalidToken));
        };

        if user.status != UserStatus::Active {
            warn!(
                tenant_id = %ctx.tenant_id,
                user_id = %ctx.user_id,
                status = user.status.as_str(),
                "Token subject is disabled"
            );
            return Err(CpaError::Unauthorized(UnauthorizedKind::AccountDisabled));
        }

        let tenant = self
            .bounded(self.store.find_tenant_by_id(ctx.tenant_id))
            .await?;
        match tenant {
            Some(tenant) if tenant.status == TenantStatus::Active => {}
            Some(tenant) => {
                warn!(
                    tenant_id = %ctx.tenant_id,
                    user_id = %ctx.user_id,
                    status = tenant.status.as_str(),
                    "Token subject's tenant is suspended"
                );
                return Err(CpaError::Unauthorized(UnauthorizedKind::AccountDisabled));
            }
            None => return Err(CpaError::Unauthorized(UnauthorizedKind::InvalidToken)),
        }

        Ok(ctx.with_role(user.role_id))
    }
}
