//! Request authentication: bearer extraction and token verification.
//!
//! Stateless. No store is consulted; the decoded context is handed back
//! to the caller to attach to the request.

use cpadesk_core::AuthContext;
use cpadesk_core::error::CpaResult;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::token::decode_access_token;

const BEARER: &str = "bearer";

/// Extract the bearer credential from the `Authorization` header.
///
/// The scheme is matched case-insensitively. An absent header, another
/// scheme or an empty credential all count as a missing token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(AuthError::MissingToken);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::TokenInvalid("authorization header is not ASCII".into()))?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingToken)?;
    if !scheme.eq_ignore_ascii_case(BEARER) {
        return Err(AuthError::MissingToken);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Authenticate a request from its headers.
pub fn authenticate(headers: &HeaderMap, config: &AuthConfig) -> CpaResult<AuthContext> {
    let result = bearer_token(headers)
        .and_then(|token| decode_access_token(token, config))
        .and_then(|claims| claims.context());

    match result {
        Ok(ctx) => Ok(ctx),
        Err(err) => {
            debug!(error = %err, "Request authentication failed");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use cpadesk_core::error::{CpaError, UnauthorizedKind};
    use http::HeaderValue;
    use uuid::Uuid;

    use super::*;
    use crate::config::JwtKey;
    use crate::token::issue_access_token;

    fn config() -> AuthConfig {
        AuthConfig::new(JwtKey::Hmac("middleware-secret".into()))
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn kind(result: CpaResult<AuthContext>) -> UnauthorizedKind {
        match result {
            Err(CpaError::Unauthorized(kind)) => kind,
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn absent_header_is_missing_token() {
        assert_eq!(
            kind(authenticate(&HeaderMap::new(), &config())),
            UnauthorizedKind::MissingToken
        );
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_missing() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer    ", "token"] {
            assert_eq!(
                kind(authenticate(&headers(value), &config())),
                UnauthorizedKind::MissingToken,
                "header {value:?}"
            );
        }
    }

    #[test]
    fn scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers("BEARER  abc ")).unwrap(), "abc");
    }

    #[test]
    fn bad_signature_is_invalid_token() {
        let id = Uuid::new_v4();
        let forged = issue_access_token(
            id,
            id,
            id,
            &AuthConfig::new(JwtKey::Hmac("someone-else".into())),
        )
        .unwrap();

        assert_eq!(
            kind(authenticate(&headers(&format!("Bearer {forged}")), &config())),
            UnauthorizedKind::InvalidToken
        );
    }

    #[test]
    fn valid_token_yields_context() {
        let config = config();
        let (user, tenant, role) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let token = issue_access_token(user, tenant, role, &config).unwrap();

        let ctx = authenticate(&headers(&format!("Bearer {token}")), &config).unwrap();
        assert_eq!(ctx, AuthContext::new(user, tenant, role));
    }
}
