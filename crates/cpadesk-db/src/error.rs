//! Database-specific error types and conversions.

use cpadesk_core::error::CpaError;
use surrealdb::IndexedResults;
use surrealdb_types::{ConnectionError, QueryError};

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Driver or engine failure talking to SurrealDB.
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    /// A statement was executed but rejected.
    #[error("Query failed: {0}")]
    Query(String),

    /// The engine aborted the statement but the same call may succeed
    /// when retried (transaction conflict, timeout).
    #[error("Retryable query failure: {0}")]
    Retryable(String),

    /// A unique index rejected the write.
    #[error("Duplicate {entity}")]
    Duplicate { entity: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid database configuration: {0}")]
    Config(String),

    /// The engine did not answer in time while connecting.
    #[error("Database unreachable: {0}")]
    Unreachable(String),

    /// A stored value could not be decoded into a domain type.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Password hashing or verification failed.
    #[error("Password hashing failed: {0}")]
    Hash(String),
}

impl DbError {
    /// Classify a statement error, recognising unique-index violations and
    /// retryable engine aborts.
    pub(crate) fn from_statement(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::Duplicate {
                entity: entity.into(),
            }
        } else if is_transient(&err) {
            DbError::Retryable(message)
        } else {
            DbError::Query(message)
        }
    }

    /// Classify every failed statement of a multi-statement transaction.
    ///
    /// A failed transaction reports its cause on one statement and a
    /// generic "not executed" error on the rest, so the cause is looked
    /// for across all of them.
    pub(crate) fn from_transaction(entity: &str, response: &mut IndexedResults) -> Option<Self> {
        let mut errors: Vec<(usize, surrealdb::Error)> =
            response.take_errors().into_iter().collect();
        errors.sort_by_key(|(index, _)| *index);

        let mut rejected = Vec::new();
        for (_, err) in errors {
            match DbError::from_statement(entity, err) {
                DbError::Query(msg) => rejected.push(msg),
                classified => return Some(classified),
            }
        }
        let cause = rejected
            .iter()
            .position(|msg| !msg.contains("not executed"))
            .unwrap_or(0);
        (cause < rejected.len()).then(|| DbError::Query(rejected.swap_remove(cause)))
    }

    /// True when the failure was a write conflict with a concurrent
    /// transaction.
    pub(crate) fn is_conflict(&self) -> bool {
        matches!(self, DbError::Retryable(msg) if msg.contains("conflict"))
    }
}

/// Whether a driver error says nothing about the request itself: the
/// transport failed, the query ran out of time or lost a write race.
pub(crate) fn is_transient(err: &surrealdb::Error) -> bool {
    if err.is_connection() {
        return !matches!(
            err.connection_details(),
            Some(ConnectionError::AlreadyConnected)
        );
    }
    if matches!(
        err.query_details(),
        Some(QueryError::TimedOut { .. } | QueryError::TransactionConflict)
    ) {
        return true;
    }
    // The embedded engines report conflicts as plain messages.
    err.message().contains("Transaction conflict")
}

impl From<DbError> for CpaError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CpaError::NotFound { entity, id },
            DbError::Duplicate { entity } => CpaError::AlreadyExists { entity },
            DbError::Surreal(e) if is_transient(&e) => CpaError::TransientStore(e.to_string()),
            DbError::Retryable(msg) | DbError::Unreachable(msg) => CpaError::TransientStore(msg),
            DbError::Hash(msg) => CpaError::Crypto(msg),
            other => CpaError::Database(other.to_string()),
        }
    }
}
