//! Error types for the cpadesk entitlement core.
//!
//! Every failure is classified by kind so that callers can render the
//! right status code and message without inspecting strings.

use std::fmt;

use thiserror::Error;

/// Why a request could not be authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnauthorizedKind {
    MissingToken,
    InvalidToken,
    TokenExpired,
    /// The token subject exists but is not active.
    AccountDisabled,
    /// Unknown login identifier or wrong password.
    InvalidCredentials,
}

impl fmt::Display for UnauthorizedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingToken => "missing bearer token",
            Self::InvalidToken => "invalid token",
            Self::TokenExpired => "token has expired",
            Self::AccountDisabled => "account is disabled",
            Self::InvalidCredentials => "invalid credentials",
        };
        f.write_str(text)
    }
}

/// Why an authenticated request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForbiddenKind {
    /// The caller's role lacks the named permission.
    MissingPermission(String),
    /// The target belongs to another tenant.
    CrossTenantAccess,
}

impl fmt::Display for ForbiddenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPermission(name) => write!(f, "missing permission: {name}"),
            Self::CrossTenantAccess => f.write_str("cross-tenant access"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CpaError {
    #[error("Unauthorized: {0}")]
    Unauthorized(UnauthorizedKind),

    #[error("Forbidden: {0}")]
    Forbidden(ForbiddenKind),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The store could not be reached or did not answer in time.
    #[error("Store unavailable: {0}")]
    TransientStore(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CpaError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn missing_permission(name: impl Into<String>) -> Self {
        Self::Forbidden(ForbiddenKind::MissingPermission(name.into()))
    }

    pub fn cross_tenant() -> Self {
        Self::Forbidden(ForbiddenKind::CrossTenantAccess)
    }

    /// Only store outages may be retried, and only by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }
}

pub type CpaResult<T> = Result<T, CpaError>;
