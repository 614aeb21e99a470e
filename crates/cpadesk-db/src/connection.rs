//! Opening the SurrealDB handle the server runs on.
//!
//! The endpoint scheme picks the engine (`ws://`, `wss://`, `http://`,
//! `mem://`, ...), so the same code path serves production and embedded
//! test databases.

use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::{info, warn};

use crate::error::DbError;

/// Where and how to reach SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint with scheme, e.g. `ws://127.0.0.1:8000` or `mem://`.
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials. Embedded engines run without authentication and
    /// leave this unset.
    pub credentials: Option<(String, String)>,
    /// Upper bound for connecting, signing in and selecting the database.
    pub connect_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8000".into(),
            namespace: "cpadesk".into(),
            database: "main".into(),
            credentials: Some(("root".into(), "root".into())),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl DbConfig {
    /// Reject settings that can only fail once a connection is attempted.
    pub fn validate(&self) -> Result<(), DbError> {
        let Some((scheme, _)) = self.endpoint.split_once("://") else {
            return Err(DbError::Config(format!(
                "endpoint `{}` has no scheme (expected e.g. ws://host:port)",
                self.endpoint
            )));
        };
        if scheme.is_empty() {
            return Err(DbError::Config(format!(
                "endpoint `{}` has an empty scheme",
                self.endpoint
            )));
        }
        if self.namespace.trim().is_empty() || self.database.trim().is_empty() {
            return Err(DbError::Config(
                "namespace and database must not be empty".into(),
            ));
        }
        if matches!(&self.credentials, Some((username, _)) if username.is_empty()) {
            return Err(DbError::Config("database username must not be empty".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(DbError::Config("connect timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Owns the database handle shared by every repository.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Validate `config`, then connect, sign in and select the namespace and
    /// database, all within `config.connect_timeout`.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        config.validate()?;

        info!(
            endpoint = %config.endpoint,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = match tokio::time::timeout(config.connect_timeout, open(config)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    endpoint = %config.endpoint,
                    timeout_ms = config.connect_timeout.as_millis() as u64,
                    "SurrealDB did not answer"
                );
                return Err(DbError::Unreachable(format!(
                    "{} did not answer within {:?}",
                    config.endpoint, config.connect_timeout
                )));
            }
        };

        info!("Connected to SurrealDB");

        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    /// Round-trip to the engine; fails when it can no longer serve queries.
    pub async fn health(&self) -> Result<(), DbError> {
        self.db.health().await?;
        Ok(())
    }
}

async fn open(config: &DbConfig) -> Result<Surreal<Any>, DbError> {
    let db = any::connect(config.endpoint.as_str()).await?;

    if let Some((username, password)) = &config.credentials {
        db.signin(Root {
            username: username.clone(),
            password: password.clone(),
        })
        .await?;
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await?;

    Ok(db)
}
