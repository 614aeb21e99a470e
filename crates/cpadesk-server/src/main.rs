//! cpadesk server entry point.

use std::process;

use cpadesk_server::ServerConfig;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = ServerConfig::load().unwrap_or_else(|e| {
        // Logging is not initialised yet.
        eprintln!("Configuration error: {e}");
        process::exit(2);
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    if let Err(e) = cpadesk_server::serve(config).await {
        error!(error = %e, "Server failed");
        process::exit(1);
    }
}
