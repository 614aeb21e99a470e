//! cpadesk server: the HTTP surface over authentication, authorization
//! and entitlement administration.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError};
pub use routes::router;
pub use state::AppState;

use cpadesk_db::DbManager;
use tokio::net::TcpListener;
use tracing::info;

/// Connect to the database, apply migrations and serve until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let auth_config = config.auth_config()?;
    let authz_config = config.authz_config();

    let manager = DbManager::connect(&config.db_config()).await?;
    cpadesk_db::run_migrations(manager.client()).await?;

    let state = AppState::new(manager.client().clone(), auth_config, &authz_config);
    let app = router(state);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
