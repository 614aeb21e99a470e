//! Route table and handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router, middleware};
use cpadesk_auth::{LoginInput, LoginOutput};
use cpadesk_core::AuthContext;
use cpadesk_core::CpaError;
use cpadesk_core::models::permission::Permission;
use cpadesk_core::models::role::Role;
use cpadesk_core::models::role_permission::RolePermission;
use cpadesk_core::models::user::User;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use surrealdb::Connection;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::require_auth;
use crate::state::AppState;

const VIEW_ROLES: &str = "view_roles";
const MANAGE_ROLES: &str = "manage_roles";
const VIEW_USERS: &str = "view_users";
const MANAGE_USERS: &str = "manage_users";

pub fn router<C: Connection>(state: AppState<C>) -> Router {
    let api = Router::new()
        .route("/roles/:role_id", get(get_role::<C>).delete(delete_role::<C>))
        .route("/roles/:role_id/permissions", get(role_permissions::<C>))
        .route(
            "/roles/:role_id/permissions/:permission",
            put(grant_permission::<C>).delete(revoke_permission::<C>),
        )
        .route("/users/:user_id", get(get_user::<C>))
        .route("/users/:user_id/role", put(assign_role::<C>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<C>,
        ));

    Router::new()
        .route("/healthz", get(healthz::<C>))
        .route("/auth/login", post(login::<C>))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz<C: Connection>(
    State(state): State<AppState<C>>,
) -> Result<Json<Value>, ApiError> {
    state
        .db()
        .query("RETURN true")
        .await
        .map_err(|e| CpaError::TransientStore(e.to_string()))?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn login<C: Connection>(
    State(state): State<AppState<C>>,
    Json(input): Json<LoginInput>,
) -> Result<Json<LoginOutput>, ApiError> {
    Ok(Json(state.auth().login(input).await?))
}

async fn get_role<C: Connection>(
    State(state): State<AppState<C>>,
    Extension(ctx): Extension<AuthContext>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Role>, ApiError> {
    state.authorize(&ctx, &[VIEW_ROLES], Some(role_id)).await?;
    let result = state.admin().guard().load_role(&ctx, role_id).await;
    Ok(Json(state.audited(&ctx, Some(role_id), result).await?))
}

async fn role_permissions<C: Connection>(
    State(state): State<AppState<C>>,
    Extension(ctx): Extension<AuthContext>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    state.authorize(&ctx, &[VIEW_ROLES], Some(role_id)).await?;
    let result = state.admin().role_permissions(&ctx, role_id).await;
    Ok(Json(state.audited(&ctx, Some(role_id), result).await?))
}

async fn grant_permission<C: Connection>(
    State(state): State<AppState<C>>,
    Extension(ctx): Extension<AuthContext>,
    Path((role_id, permission)): Path<(Uuid, String)>,
) -> Result<(StatusCode, Json<RolePermission>), ApiError> {
    state.authorize(&ctx, &[MANAGE_ROLES], Some(role_id)).await?;
    let result = state.admin().grant(&ctx, role_id, &permission).await;
    let mapping = state.audited(&ctx, Some(role_id), result).await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

#[derive(Debug, Serialize)]
struct Revoked {
    revoked: bool,
}

async fn revoke_permission<C: Connection>(
    State(state): State<AppState<C>>,
    Extension(ctx): Extension<AuthContext>,
    Path((role_id, permission)): Path<(Uuid, String)>,
) -> Result<Json<Revoked>, ApiError> {
    state.authorize(&ctx, &[MANAGE_ROLES], Some(role_id)).await?;
    let result = state.admin().revoke(&ctx, role_id, &permission).await;
    let revoked = state.audited(&ctx, Some(role_id), result).await?;
    Ok(Json(Revoked { revoked }))
}

async fn delete_role<C: Connection>(
    State(state): State<AppState<C>>,
    Extension(ctx): Extension<AuthContext>,
    Path(role_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.authorize(&ctx, &[MANAGE_ROLES], Some(role_id)).await?;
    let result = state.admin().delete_role(&ctx, role_id).await;
    state.audited(&ctx, Some(role_id), result).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_user<C: Connection>(
    State(state): State<AppState<C>>,
    Extension(ctx): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    state.authorize(&ctx, &[VIEW_USERS], Some(user_id)).await?;
    let result = state.admin().guard().load_user(&ctx, user_id).await;
    Ok(Json(state.audited(&ctx, Some(user_id), result).await?))
}

#[derive(Debug, Deserialize)]
struct AssignRole {
    role_id: Uuid,
}

async fn assign_role<C: Connection>(
    State(state): State<AppState<C>>,
    Extension(ctx): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<AssignRole>,
) -> Result<Json<User>, ApiError> {
    state.authorize(&ctx, &[MANAGE_USERS], Some(user_id)).await?;
    let result = state.admin().assign_role(&ctx, user_id, body.role_id).await;
    Ok(Json(state.audited(&ctx, Some(user_id), result).await?))
}
