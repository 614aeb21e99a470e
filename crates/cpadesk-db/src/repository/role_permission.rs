//! SurrealDB implementation of [`RolePermissionRepository`] over the
//! `grants` relation.

use chrono::{DateTime, Utc};
use cpadesk_core::error::{CpaError, CpaResult};
use cpadesk_core::models::permission::Permission;
use cpadesk_core::models::role_permission::RolePermission;
use cpadesk_core::repository::RolePermissionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::permission::PermissionRowWithId;
use crate::rows::{CountRow, parse_opt_uuid, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct GrantRow {
    granted_by: Option<String>,
    granted_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct GrantRowWithEnds {
    role_id: String,
    permission_id: String,
    granted_by: Option<String>,
    granted_at: DateTime<Utc>,
}

impl GrantRowWithEnds {
    fn try_into_mapping(self) -> Result<RolePermission, DbError> {
        Ok(RolePermission {
            role_id: parse_uuid("role", &self.role_id)?,
            permission_id: parse_uuid("permission", &self.permission_id)?,
            granted_by: parse_opt_uuid("granted_by", self.granted_by.as_deref())?,
            granted_at: self.granted_at,
        })
    }
}

/// Permissions reachable from a role through its `grants` edges.
pub(crate) async fn permissions_of_role<C: Connection>(
    db: &Surreal<C>,
    role_id: Uuid,
) -> Result<Vec<Permission>, DbError> {
    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id, * FROM permission \
             WHERE id IN (\
                 SELECT VALUE out FROM grants \
                 WHERE in = type::record('role', $role_id)\
             ) \
             ORDER BY name ASC",
        )
        .bind(("role_id", role_id.to_string()))
        .await?;

    let rows: Vec<PermissionRowWithId> = result.take(0)?;

    rows.into_iter()
        .map(|row| row.try_into_permission())
        .collect()
}

/// SurrealDB implementation of the role/permission mapping.
#[derive(Clone)]
pub struct SurrealRolePermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRolePermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn count(&self, query: &str, id: Uuid) -> Result<u64, DbError> {
        let mut result = self.db.query(query).bind(("id", id.to_string())).await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(total_of(&rows))
    }

    async fn pair_exists(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM grants WHERE \
                 in = type::record('role', $role_id) AND \
                 out = type::record('permission', $perm_id) GROUP ALL",
            )
            .bind(("role_id", role_id.to_string()))
            .bind(("perm_id", permission_id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(total_of(&rows) > 0)
    }
}

impl<C: Connection> RolePermissionRepository for SurrealRolePermissionRepository<C> {
    async fn grant(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        granted_by: Option<Uuid>,
    ) -> CpaResult<RolePermission> {
        if self
            .count(
                "SELECT count() AS total FROM type::record('role', $id) GROUP ALL",
                role_id,
            )
            .await?
            == 0
        {
            return Err(CpaError::not_found("role", role_id));
        }
        if self
            .count(
                "SELECT count() AS total FROM type::record('permission', $id) GROUP ALL",
                permission_id,
            )
            .await?
            == 0
        {
            return Err(CpaError::not_found("permission", permission_id));
        }
        if self.pair_exists(role_id, permission_id).await? {
            return Err(CpaError::AlreadyExists {
                entity: "role_permission".into(),
            });
        }

        // RELATE needs literal record ids; UUIDs are safe to embed.
        let query = format!(
            "RELATE role:`{role_id}` -> grants -> permission:`{permission_id}` \
             SET granted_by = $granted_by;"
        );

        let result = self
            .db
            .query(query)
            .bind(("granted_by", granted_by.map(|u| u.to_string())))
            .await
            .map_err(DbError::from)?;

        // A concurrent grant of the same pair loses either on the unique
        // index or on a write conflict. Both mean the pair is taken once
        // the winner has committed.
        let mut result = match result.check() {
            Ok(result) => result,
            Err(e) => {
                let err = DbError::from_statement("role_permission", e);
                if matches!(err, DbError::Duplicate { .. })
                    || (err.is_conflict() && self.pair_exists(role_id, permission_id).await?)
                {
                    return Err(CpaError::AlreadyExists {
                        entity: "role_permission".into(),
                    });
                }
                return Err(err.into());
            }
        };

        let rows: Vec<GrantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role_permission".into(),
            id: format!("{role_id}:{permission_id}"),
        })?;

        info!(%role_id, %permission_id, "Granted permission to role");

        Ok(RolePermission {
            role_id,
            permission_id,
            granted_by: parse_opt_uuid("granted_by", row.granted_by.as_deref())?,
            granted_at: row.granted_at,
        })
    }

    async fn revoke(&self, role_id: Uuid, permission_id: Uuid) -> CpaResult<bool> {
        let mut result = self
            .db
            .query(
                "DELETE grants WHERE \
                 in = type::record('role', $role_id) AND \
                 out = type::record('permission', $perm_id) \
                 RETURN BEFORE",
            )
            .bind(("role_id", role_id.to_string()))
            .bind(("perm_id", permission_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("role_permission", e))?;

        let removed: Vec<GrantRow> = result.take(0).map_err(DbError::from)?;

        if !removed.is_empty() {
            info!(%role_id, %permission_id, "Revoked permission from role");
        }

        Ok(!removed.is_empty())
    }

    async fn list_for_role(&self, role_id: Uuid) -> CpaResult<Vec<RolePermission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(in) AS role_id, meta::id(out) AS permission_id, \
                 granted_by, granted_at FROM grants \
                 WHERE in = type::record('role', $role_id) \
                 ORDER BY granted_at ASC",
            )
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GrantRowWithEnds> = result.take(0).map_err(DbError::from)?;

        let mappings = rows
            .into_iter()
            .map(|row| row.try_into_mapping())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(mappings)
    }

    async fn permissions_for_role(&self, role_id: Uuid) -> CpaResult<Vec<Permission>> {
        Ok(permissions_of_role(&self.db, role_id).await?)
    }
}
