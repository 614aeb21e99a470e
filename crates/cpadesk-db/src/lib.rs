//! cpadesk database layer: SurrealDB connection management, schema
//! migrations and the repository implementations of the `cpadesk-core`
//! traits.

mod connection;
mod error;
pub mod repository;
mod rows;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
