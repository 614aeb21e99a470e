//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id (memory: 19 MiB, iterations: 2,
//! parallelism: 1) with a fresh salt per hash. An optional pepper
//! (server-side secret) can be provided at construction time.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use cpadesk_core::error::{CpaError, CpaResult};
use cpadesk_core::models::user::{CreateUser, UpdateUser, User, UserStatus};
use cpadesk_core::repository::{PaginatedResult, Pagination, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::role::role_owner;
use crate::rows::{CountRow, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct UserRow {
    tenant_id: String,
    role_id: String,
    name: String,
    email: String,
    password_hash: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    tenant_id: String,
    role_id: String,
    name: String,
    email: String,
    password_hash: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct OwnerRow {
    tenant_id: String,
}

fn parse_status(s: &str) -> Result<UserStatus, DbError> {
    UserStatus::parse(s).ok_or_else(|| DbError::Corrupt(format!("unknown user status: {s}")))
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        Ok(User {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            role_id: parse_uuid("role", &self.role_id)?,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = parse_uuid("user", &self.record_id)?;
        UserRow {
            tenant_id: self.tenant_id,
            role_id: self.role_id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_user(id)
    }
}

/// Fetch a user only if it belongs to `tenant_id`.
pub(crate) async fn find_user<C: Connection>(
    db: &Surreal<C>,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<Option<User>, DbError> {
    let mut result = db
        .query(
            "SELECT * FROM type::record('user', $id) \
             WHERE tenant_id = $tenant_id",
        )
        .bind(("id", id.to_string()))
        .bind(("tenant_id", tenant_id.to_string()))
        .await?;

    let rows: Vec<UserRow> = result.take(0)?;
    rows.into_iter().next().map(|row| row.into_user(id)).transpose()
}

fn peppered<'a>(password: &'a str, pepper: Option<&str>, buf: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            *buf = format!("{p}{password}");
            buf.as_bytes()
        }
        None => password.as_bytes(),
    }
}

/// Hash a password with Argon2id.
///
/// If a pepper is provided it is prepended to the password before hashing;
/// verification must apply the same pepper.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Hash(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    /// A user may only hold a role of its own tenant.
    async fn ensure_role_in_tenant(&self, tenant_id: Uuid, role_id: Uuid) -> CpaResult<()> {
        match role_owner(&self.db, role_id).await? {
            None => Err(CpaError::not_found("role", role_id)),
            Some(owner) if owner != tenant_id => Err(CpaError::Conflict {
                reason: format!("role {role_id} does not belong to tenant {tenant_id}"),
            }),
            Some(_) => Ok(()),
        }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> CpaResult<User> {
        self.ensure_role_in_tenant(input.tenant_id, input.role_id)
            .await?;

        let id = Uuid::new_v4();

        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let mut result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $claimed = (UPDATE type::record('role', $role_id) \
                     SET assignment_rev += 1 WHERE tenant_id = $tenant_id); \
                 IF array::len($claimed) > 0 { \
                     CREATE type::record('user', $id) SET \
                     tenant_id = $tenant_id, role_id = $role_id, \
                     name = $name, email = $email, \
                     password_hash = $password_hash, \
                     status = $status; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("role_id", input.role_id.to_string()))
            .bind(("name", input.name))
            .bind(("email", input.email))
            .bind(("password_hash", password_hash))
            .bind(("status", UserStatus::Active.as_str().to_string()))
            .await
            .map_err(DbError::from)?;
        if let Some(err) = DbError::from_transaction("user", &mut result) {
            return Err(err.into());
        }

        // Nothing was created when the role vanished after the check above.
        let user = find_user(&self.db, input.tenant_id, id)
            .await?
            .ok_or_else(|| CpaError::not_found("role", input.role_id))?;

        Ok(user)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CpaResult<User> {
        find_user(&self.db, tenant_id, id)
            .await?
            .ok_or_else(|| CpaError::not_found("user", id))
    }

    async fn get_by_email(&self, tenant_id: Uuid, email: &str) -> CpaResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE tenant_id = $tenant_id AND email = $email",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("email={email}"),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateUser) -> CpaResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {} \
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
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(status) = input.status {
            builder = builder.bind(("status", status.as_str().to_string()));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn assign_role(&self, tenant_id: Uuid, id: Uuid, role_id: Uuid) -> CpaResult<User> {
        self.ensure_role_in_tenant(tenant_id, role_id).await?;

        let mut result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $claimed = (UPDATE type::record('role', $role_id) \
                     SET assignment_rev += 1 WHERE tenant_id = $tenant_id); \
                 IF array::len($claimed) > 0 { \
                     UPDATE type::record('user', $id) SET \
                     role_id = $role_id, updated_at = time::now() \
                     WHERE tenant_id = $tenant_id; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        if let Some(err) = DbError::from_transaction("user", &mut result) {
            return Err(err.into());
        }

        let user = find_user(&self.db, tenant_id, id)
            .await?
            .ok_or_else(|| CpaError::not_found("user", id))?;
        if user.role_id != role_id {
            // Either the role was deleted after the check above or a later
            // assignment already replaced this one.
            self.ensure_role_in_tenant(tenant_id, role_id).await?;
            return Err(CpaError::Conflict {
                reason: format!("user {id} was reassigned concurrently"),
            });
        }

        info!(%tenant_id, user_id = %id, %role_id, "Assigned role to user");

        Ok(user)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> CpaResult<()> {
        // Soft-delete: the user keeps its role reference but can no longer
        // authenticate.
        let mut result = self
            .db
            .query(
                "UPDATE type::record('user', $id) SET \
                 status = $status, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("status", UserStatus::Inactive.as_str().to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(CpaError::not_found("user", id));
        }

        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CpaResult<PaginatedResult<User>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
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
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn count_with_role(&self, tenant_id: Uuid, role_id: Uuid) -> CpaResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE tenant_id = $tenant_id AND role_id = $role_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(&rows))
    }

    async fn owner_tenant(&self, id: Uuid) -> CpaResult<Option<Uuid>> {
        let mut result = self
            .db
            .query("SELECT tenant_id FROM type::record('user', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OwnerRow> = result.take(0).map_err(DbError::from)?;
        let owner = rows
            .into_iter()
            .next()
            .map(|row| parse_uuid("tenant", &row.tenant_id))
            .transpose()?;

        Ok(owner)
    }
}
