//! Authentication error types.

use cpadesk_core::error::{CpaError, UnauthorizedKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for CpaError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => CpaError::Unauthorized(UnauthorizedKind::MissingToken),
            AuthError::TokenInvalid(_) => CpaError::Unauthorized(UnauthorizedKind::InvalidToken),
            AuthError::TokenExpired => CpaError::Unauthorized(UnauthorizedKind::TokenExpired),
            AuthError::InvalidCredentials => {
                CpaError::Unauthorized(UnauthorizedKind::InvalidCredentials)
            }
            AuthError::AccountDisabled => {
                CpaError::Unauthorized(UnauthorizedKind::AccountDisabled)
            }
            AuthError::Crypto(msg) => CpaError::Crypto(msg),
        }
    }
}
