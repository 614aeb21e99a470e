//! HTTP rendering of [`CpaError`] and server start-up failures.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use cpadesk_core::error::{CpaError, ForbiddenKind, UnauthorizedKind};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Why the server could not start or keep serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connecting to or migrating the database failed.
    #[error("Database start-up failed: {0}")]
    Database(#[from] cpadesk_db::DbError),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Handler error: a [`CpaError`] rendered as `{ "error": { code, message } }`.
#[derive(Debug)]
pub struct ApiError(pub CpaError);

impl From<CpaError> for ApiError {
    fn from(err: CpaError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CpaError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CpaError::Forbidden(_) => StatusCode::FORBIDDEN,
            CpaError::NotFound { .. } => StatusCode::NOT_FOUND,
            CpaError::AlreadyExists { .. } | CpaError::Conflict { .. } => StatusCode::CONFLICT,
            CpaError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CpaError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            CpaError::Database(_) | CpaError::Crypto(_) | CpaError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match &self.0 {
            CpaError::Unauthorized(kind) => match kind {
                UnauthorizedKind::MissingToken => "missing_token",
                UnauthorizedKind::InvalidToken => "invalid_token",
                UnauthorizedKind::TokenExpired => "token_expired",
                UnauthorizedKind::AccountDisabled => "account_disabled",
                UnauthorizedKind::InvalidCredentials => "invalid_credentials",
            },
            CpaError::Forbidden(kind) => match kind {
                ForbiddenKind::MissingPermission(_) => "missing_permission",
                ForbiddenKind::CrossTenantAccess => "cross_tenant_access",
            },
            CpaError::NotFound { .. } => "not_found",
            CpaError::AlreadyExists { .. } => "already_exists",
            CpaError::Conflict { .. } => "conflict",
            CpaError::Validation { .. } => "validation_failed",
            CpaError::TransientStore(_) => "store_unavailable",
            CpaError::Database(_) | CpaError::Crypto(_) | CpaError::Internal(_) => {
                "internal_error"
            }
        }
    }

    fn message(&self) -> String {
        match &self.0 {
            // Details of these stay in the server log.
            CpaError::TransientStore(_) => "Service temporarily unavailable".into(),
            CpaError::Database(_) | CpaError::Crypto(_) | CpaError::Internal(_) => {
                "Internal server error".into()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, status = status.as_u16(), "Request failed");
        }

        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.code(),
                message: self.message(),
            },
        };
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if self.0.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
