//! Request authentication for the `/api` routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use surrealdb::Connection;

use crate::error::ApiError;
use crate::state::AppState;

/// Verify the bearer token and its subject, then hand the resulting
/// [`AuthContext`](cpadesk_core::AuthContext) to the handler as an
/// extension.
pub async fn require_auth<C: Connection>(
    State(state): State<AppState<C>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = cpadesk_auth::authenticate(req.headers(), state.auth().config())?;
    let ctx = state.gate().verify_subject(ctx).await?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
