//! Server configuration from command-line flags and the environment.

use std::time::Duration;

use clap::Parser;
use cpadesk_auth::{AuthConfig, JwtKey};
use cpadesk_authz::AuthzConfig;
use cpadesk_db::DbConfig;

use crate::error::ServerError;

/// cpadesk entitlement server configuration
#[derive(Debug, Parser)]
#[command(name = "cpadesk-server", about = "cpadesk entitlement server", long_about = None)]
pub struct ServerConfig {
    /// Server host address
    #[arg(short = 'H', long, env = "CPADESK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "CPADESK_PORT", default_value = "8080")]
    pub port: u16,

    /// Log filter used when RUST_LOG is unset
    #[arg(short, long, env = "CPADESK_LOG", default_value = "info")]
    pub log_level: String,

    /// SurrealDB endpoint; the scheme selects the engine (ws://, wss://, mem://)
    #[arg(long, env = "SURREAL_URL", default_value = "ws://127.0.0.1:8000")]
    pub db_url: String,

    #[arg(long, env = "SURREAL_NS", default_value = "cpadesk")]
    pub db_namespace: String,

    #[arg(long, env = "SURREAL_DB", default_value = "main")]
    pub db_database: String,

    /// Root username; empty skips sign-in (embedded engines)
    #[arg(long, env = "SURREAL_USER", default_value = "root")]
    pub db_username: String,

    #[arg(long, env = "SURREAL_PASS", hide_env_values = true, default_value = "root")]
    pub db_password: String,

    /// Database connect timeout in milliseconds
    #[arg(long, env = "SURREAL_CONNECT_TIMEOUT_MS", default_value = "10000")]
    pub db_connect_timeout_ms: u64,

    /// PEM file with the Ed25519 signing key
    #[arg(long, env = "JWT_PRIVATE_KEY_FILE", requires = "jwt_public_key_file")]
    pub jwt_private_key_file: Option<String>,

    /// PEM file with the Ed25519 verification key
    #[arg(long, env = "JWT_PUBLIC_KEY_FILE", requires = "jwt_private_key_file")]
    pub jwt_public_key_file: Option<String>,

    /// HS256 secret, used when no Ed25519 key files are given
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    #[arg(long, env = "JWT_ISSUER", default_value = "cpadesk")]
    pub jwt_issuer: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value = "900")]
    pub access_token_ttl: u64,

    /// Secret prepended to passwords before hashing
    #[arg(long, env = "PASSWORD_PEPPER", hide_env_values = true)]
    pub password_pepper: Option<String>,

    /// Entitlement store timeout in milliseconds
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value = "2000")]
    pub store_timeout_ms: u64,

    /// Resolve permissions from the store on every request
    #[arg(long, env = "DISABLE_PERMISSION_CACHE")]
    pub disable_permission_cache: bool,
}

impl ServerConfig {
    /// Load configuration from `.env`, the environment and CLI arguments.
    pub fn load() -> Result<Self, clap::Error> {
        _ = dotenvy::dotenv();
        Self::try_parse()
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            endpoint: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            credentials: (!self.db_username.is_empty())
                .then(|| (self.db_username.clone(), self.db_password.clone())),
            connect_timeout: Duration::from_millis(self.db_connect_timeout_ms),
        }
    }

    /// Token settings. Ed25519 key files win over an HMAC secret; one of
    /// the two is required.
    pub fn auth_config(&self) -> Result<AuthConfig, ServerError> {
        let jwt_key = match (
            &self.jwt_private_key_file,
            &self.jwt_public_key_file,
            &self.jwt_secret,
        ) {
            (Some(private), Some(public), _) => JwtKey::Ed25519 {
                private_pem: std::fs::read_to_string(private)?,
                public_pem: std::fs::read_to_string(public)?,
            },
            (_, _, Some(secret)) if !secret.is_empty() => JwtKey::Hmac(secret.clone()),
            _ => {
                return Err(ServerError::Config(
                    "set JWT_PRIVATE_KEY_FILE and JWT_PUBLIC_KEY_FILE, or JWT_SECRET".into(),
                ));
            }
        };

        let mut config = AuthConfig::new(jwt_key);
        config.jwt_issuer = self.jwt_issuer.clone();
        config.access_token_lifetime_secs = self.access_token_ttl;
        config.pepper = self.password_pepper.clone();
        Ok(config)
    }

    pub fn authz_config(&self) -> AuthzConfig {
        AuthzConfig {
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            cache_enabled: !self.disable_permission_cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["cpadesk-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn hmac_secret_is_accepted() {
        let config = parse(&["--jwt-secret", "s3cret", "--access-token-ttl", "60"]);
        let auth = config.auth_config().unwrap();
        assert!(matches!(auth.jwt_key, JwtKey::Hmac(ref s) if s == "s3cret"));
        assert_eq!(auth.access_token_lifetime_secs, 60);
    }

    #[test]
    fn a_signing_key_is_required() {
        let config = parse(&[]);
        assert!(matches!(config.auth_config(), Err(ServerError::Config(_))));
    }

    #[test]
    fn database_flags_map_to_db_config() {
        let config = parse(&[
            "--db-url",
            "mem://",
            "--db-username",
            "",
            "--db-connect-timeout-ms",
            "1500",
        ]);
        let db = config.db_config();
        assert_eq!(db.endpoint, "mem://");
        assert!(db.credentials.is_none());
        assert_eq!(db.connect_timeout, Duration::from_millis(1500));
        db.validate().unwrap();

        let db = parse(&[]).db_config();
        assert_eq!(db.credentials, Some(("root".into(), "root".into())));
    }

    #[test]
    fn cache_flag_and_timeout() {
        let config = parse(&["--disable-permission-cache", "--store-timeout-ms", "250"]);
        let authz = config.authz_config();
        assert!(!authz.cache_enabled);
        assert_eq!(authz.store_timeout, Duration::from_millis(250));
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
    }
}
