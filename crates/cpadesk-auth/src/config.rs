//! Authentication configuration.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

use crate::error::AuthError;

/// Key material used to sign and verify access tokens.
#[derive(Clone)]
pub enum JwtKey {
    /// EdDSA over Ed25519, PEM encoded.
    Ed25519 {
        private_pem: String,
        public_pem: String,
    },
    /// HS256 with a shared secret.
    Hmac(String),
}

impl JwtKey {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Ed25519 { .. } => Algorithm::EdDSA,
            Self::Hmac(_) => Algorithm::HS256,
        }
    }

    pub(crate) fn encoding_key(&self) -> Result<EncodingKey, AuthError> {
        match self {
            Self::Ed25519 { private_pem, .. } => EncodingKey::from_ed_pem(private_pem.as_bytes())
                .map_err(|e| AuthError::Crypto(format!("bad private key: {e}"))),
            Self::Hmac(secret) if secret.is_empty() => {
                Err(AuthError::Crypto("HMAC secret is empty".into()))
            }
            Self::Hmac(secret) => Ok(EncodingKey::from_secret(secret.as_bytes())),
        }
    }

    pub(crate) fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match self {
            Self::Ed25519 { public_pem, .. } => DecodingKey::from_ed_pem(public_pem.as_bytes())
                .map_err(|e| AuthError::Crypto(format!("bad public key: {e}"))),
            Self::Hmac(secret) if secret.is_empty() => {
                Err(AuthError::Crypto("HMAC secret is empty".into()))
            }
            Self::Hmac(secret) => Ok(DecodingKey::from_secret(secret.as_bytes())),
        }
    }
}

// Keys never show up in logs.
impl std::fmt::Debug for JwtKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ed25519 { .. } => f.write_str("JwtKey::Ed25519(..)"),
            Self::Hmac(_) => f.write_str("JwtKey::Hmac(..)"),
        }
    }
}

/// Configuration for token issuance, verification and password login.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_key: JwtKey,
    /// JWT issuer (`iss` claim), checked on every decode.
    pub jwt_issuer: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Clock skew tolerated when checking `exp` (default: 30 seconds).
    pub leeway_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id verification.
    pub pepper: Option<String>,
}

impl AuthConfig {
    pub fn new(jwt_key: JwtKey) -> Self {
        Self {
            jwt_key,
            jwt_issuer: "cpadesk".into(),
            access_token_lifetime_secs: 900,
            leeway_secs: 30,
            pepper: None,
        }
    }
}
