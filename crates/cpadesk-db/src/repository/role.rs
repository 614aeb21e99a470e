//! SurrealDB implementation of [`RoleRepository`].

use chrono::{DateTime, Utc};
use cpadesk_core::error::{CpaError, CpaResult};
use cpadesk_core::models::role::{CreateRole, Role, UpdateRole};
use cpadesk_core::repository::{PaginatedResult, Pagination, RoleRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::{CountRow, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct RoleRow {
    tenant_id: String,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct RoleRowWithId {
    record_id: String,
    tenant_id: String,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct OwnerRow {
    tenant_id: String,
}

impl RoleRow {
    fn into_role(self, id: Uuid) -> Result<Role, DbError> {
        Ok(Role {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RoleRowWithId {
    fn try_into_role(self) -> Result<Role, DbError> {
        let id = parse_uuid("role", &self.record_id)?;
        RoleRow {
            tenant_id: self.tenant_id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_role(id)
    }
}

/// Fetch a role only if it belongs to `tenant_id`.
pub(crate) async fn find_role<C: Connection>(
    db: &Surreal<C>,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<Option<Role>, DbError> {
    let mut result = db
        .query(
            "SELECT * FROM type::record('role', $id) \
             WHERE tenant_id = $tenant_id",
        )
        .bind(("id", id.to_string()))
        .bind(("tenant_id", tenant_id.to_string()))
        .await?;

    let rows: Vec<RoleRow> = result.take(0)?;
    rows.into_iter().next().map(|row| row.into_role(id)).transpose()
}

/// Owning tenant of a role, looked up without tenant scoping.
pub(crate) async fn role_owner<C: Connection>(
    db: &Surreal<C>,
    id: Uuid,
) -> Result<Option<Uuid>, DbError> {
    let mut result = db
        .query("SELECT tenant_id FROM type::record('role', $id)")
        .bind(("id", id.to_string()))
        .await?;

    let rows: Vec<OwnerRow> = result.take(0)?;
    rows.into_iter()
        .next()
        .map(|row| parse_uuid("tenant", &row.tenant_id))
        .transpose()
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn count_holders(&self, tenant_id: Uuid, id: Uuid) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE tenant_id = $tenant_id AND role_id = $id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(total_of(&rows))
    }

    async fn ensure_tenant_exists(&self, tenant_id: Uuid) -> Result<(), DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM type::record('tenant', $tenant_id) \
                 GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;

        if total_of(&rows) == 0 {
            return Err(DbError::NotFound {
                entity: "tenant".into(),
                id: tenant_id.to_string(),
            });
        }
        Ok(())
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> CpaResult<Role> {
        self.ensure_tenant_exists(input.tenant_id).await?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('role', $id) SET \
                 tenant_id = $tenant_id, \
                 name = $name, description = $description",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("role", e))?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;

        Ok(row.into_role(id)?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CpaResult<Role> {
        find_role(&self.db, tenant_id, id)
            .await?
            .ok_or_else(|| CpaError::not_found("role", id))
    }

    async fn get_by_name(&self, tenant_id: Uuid, name: &str) -> CpaResult<Role> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE tenant_id = $tenant_id AND name = $name",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: format!("name={name}"),
        })?;

        Ok(row.try_into_role()?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateRole) -> CpaResult<Role> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('role', $id) SET {} \
             WHERE tenant_id = $tenant_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("role", e))?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;

        Ok(row.into_role(id)?)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> CpaResult<()> {
        if find_role(&self.db, tenant_id, id).await?.is_none() {
            return Err(CpaError::not_found("role", id));
        }

        // Deleting writes the role record, and so does every assignment to
        // it, so the holder check and the delete cannot interleave with an
        // assignment committing in between.
        let mut result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $holders = (SELECT VALUE id FROM user \
                     WHERE tenant_id = $tenant_id AND role_id = $id); \
                 IF array::len($holders) = 0 { \
                     DELETE grants WHERE in = type::record('role', $id); \
                     DELETE type::record('role', $id) WHERE tenant_id = $tenant_id; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let failed = DbError::from_transaction("role", &mut result);

        if find_role(&self.db, tenant_id, id).await?.is_none() {
            if let Some(err) = failed {
                return Err(err.into());
            }
            info!(%tenant_id, role_id = %id, "Deleted role and its grants");
            return Ok(());
        }

        let holders = self.count_holders(tenant_id, id).await?;
        match failed {
            Some(err) if holders == 0 => Err(err.into()),
            _ => Err(CpaError::Conflict {
                reason: format!("role {id} is still assigned to {holders} user(s)"),
            }),
        }
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CpaResult<PaginatedResult<Role>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM role \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = total_of(&count_rows);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_role())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn owner_tenant(&self, id: Uuid) -> CpaResult<Option<Uuid>> {
        Ok(role_owner(&self.db, id).await?)
    }
}
