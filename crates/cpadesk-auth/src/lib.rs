//! cpadesk auth: bearer authentication, JWT access tokens and password
//! login.

pub mod config;
pub mod error;
pub mod middleware;
pub mod password;
pub mod service;
pub mod token;

pub use config::{AuthConfig, JwtKey};
pub use error::AuthError;
pub use middleware::{authenticate, bearer_token};
pub use service::{AuthService, LoginInput, LoginOutput};
pub use token::{AccessTokenClaims, issue_access_token};
