//! JWT access token issuance and verification.

use chrono::Utc;
use cpadesk_core::AuthContext;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: user ID (UUID string).
    pub sub: String,
    pub tenant_id: String,
    pub role_id: String,
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

impl AccessTokenClaims {
    /// Fresh claims for the given identity, valid for the configured lifetime.
    pub fn new(user_id: Uuid, tenant_id: Uuid, role_id: Uuid, config: &AuthConfig) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            role_id: role_id.to_string(),
            iss: config.jwt_issuer.clone(),
            iat: now,
            exp: now + config.access_token_lifetime_secs as i64,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// The identity carried by a verified token.
    ///
    /// A correctly signed token whose ids are not UUIDs is still invalid.
    pub fn context(&self) -> Result<AuthContext, AuthError> {
        let parse = |claim: &str, value: &str| {
            Uuid::parse_str(value)
                .map_err(|e| AuthError::TokenInvalid(format!("{claim} is not a UUID: {e}")))
        };
        Ok(AuthContext::new(
            parse("sub", &self.sub)?,
            parse("tenant_id", &self.tenant_id)?,
            parse("role_id", &self.role_id)?,
        ))
    }
}

/// Sign arbitrary claims with the configured key.
pub fn encode_claims(claims: &AccessTokenClaims, config: &AuthConfig) -> Result<String, AuthError> {
    let key = config.jwt_key.encoding_key()?;
    let header = Header::new(config.jwt_key.algorithm());
    jsonwebtoken::encode(&header, claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Issue a signed access token for the given identity.
pub fn issue_access_token(
    user_id: Uuid,
    tenant_id: Uuid,
    role_id: Uuid,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    encode_claims(
        &AccessTokenClaims::new(user_id, tenant_id, role_id, config),
        config,
    )
}

/// Decode and verify an access token: signature, algorithm, issuer and
/// expiry.
pub fn decode_access_token(
    token: &str,
    config: &AuthConfig,
) -> Result<AccessTokenClaims, AuthError> {
    let key = config.jwt_key.decoding_key()?;

    let mut validation = Validation::new(config.jwt_key.algorithm());
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);
    validation.leeway = config.leeway_secs;

    jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
}
