//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The `audit_log` table refuses updates and deletes at the schema level,
//! so this repository only appends and reads.

use chrono::{DateTime, Utc};
use cpadesk_core::error::CpaResult;
use cpadesk_core::models::audit::{AuditEventType, AuditLogEntry, CreateAuditLogEntry};
use cpadesk_core::repository::{AuditLogRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::{CountRow, parse_opt_uuid, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct AuditRow {
    tenant_id: String,
    actor_id: Option<String>,
    event_type: String,
    target_id: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    tenant_id: String,
    actor_id: Option<String>,
    event_type: String,
    target_id: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl AuditRowWithId {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let id = parse_uuid("audit_log", &self.record_id)?;
        AuditRow {
            tenant_id: self.tenant_id,
            actor_id: self.actor_id,
            event_type: self.event_type,
            target_id: self.target_id,
            metadata: self.metadata,
            timestamp: self.timestamp,
        }
        .into_entry(id)
    }
}

impl AuditRow {
    fn into_entry(self, id: Uuid) -> Result<AuditLogEntry, DbError> {
        let event_type = AuditEventType::parse(&self.event_type).ok_or_else(|| {
            DbError::Corrupt(format!("unknown audit event type: {}", self.event_type))
        })?;

        Ok(AuditLogEntry {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            actor_id: parse_opt_uuid("actor", self.actor_id.as_deref())?,
            event_type,
            target_id: parse_opt_uuid("target", self.target_id.as_deref())?,
            metadata: self.metadata,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> CpaResult<AuditLogEntry> {
        let id = Uuid::new_v4();
        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 tenant_id = $tenant_id, actor_id = $actor_id, \
                 event_type = $event_type, target_id = $target_id, \
                 metadata = $metadata",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("actor_id", input.actor_id.map(|u| u.to_string())))
            .bind(("event_type", input.event_type.as_str().to_string()))
            .bind(("target_id", input.target_id.map(|u| u.to_string())))
            .bind(("metadata", metadata))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("audit_log", e))?;

        let rows: Vec<AuditRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id.to_string(),
        })?;

        Ok(row.into_entry(id)?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CpaResult<PaginatedResult<AuditLogEntry>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM audit_log \
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
                "SELECT meta::id(id) AS record_id, * FROM audit_log \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY timestamp DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuditRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
