//! cpadesk core: domain models, the error taxonomy, the authenticated
//! request context and the repository traits shared by every other crate.

pub mod context;
pub mod error;
pub mod models;
pub mod repository;

pub use context::AuthContext;
pub use error::{CpaError, CpaResult, ForbiddenKind, UnauthorizedKind};
