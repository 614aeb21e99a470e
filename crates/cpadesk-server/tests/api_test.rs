//! HTTP-level tests: login, bearer authentication, permission checks,
//! tenant isolation and grant administration through the router.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use cpadesk_auth::{AuthConfig, JwtKey};
use cpadesk_authz::AuthzConfig;
use cpadesk_core::models::audit::AuditEventType;
use cpadesk_core::models::permission::CreatePermission;
use cpadesk_core::models::role::CreateRole;
use cpadesk_core::models::tenant::CreateTenant;
use cpadesk_core::models::user::{CreateUser, UpdateUser, UserStatus};
use cpadesk_core::repository::{
    AuditLogRepository, Pagination, PermissionRepository, RolePermissionRepository,
    RoleRepository, TenantRepository, UserRepository,
};
use cpadesk_db::repository::{
    SurrealAuditLogRepository, SurrealPermissionRepository, SurrealRolePermissionRepository,
    SurrealRoleRepository, SurrealTenantRepository, SurrealUserRepository,
};
use cpadesk_server::{AppState, router};
use serde_json::{Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tower::ServiceExt;
use uuid::Uuid;

const PASSWORD: &str = "correct horse battery";

struct Fixture {
    db: Surreal<Db>,
    app: Router,
    acme: Uuid,
    globex: Uuid,
    acme_admin: Uuid,
    manager: Uuid,
    bob: Uuid,
}

fn auth_config() -> AuthConfig {
    AuthConfig::new(JwtKey::Hmac("api-test-secret".into()))
}

/// Acme with roles Admin (all admin permissions) and Manager (client
/// work only), Globex with its own Admin. Users: ann (Acme Admin),
/// bob (Acme Manager), gus (Globex Admin).
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cpadesk_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    let acme = tenants
        .create(CreateTenant {
            name: "Acme".into(),
        })
        .await
        .unwrap()
        .id;
    let globex = tenants
        .create(CreateTenant {
            name: "Globex".into(),
        })
        .await
        .unwrap()
        .id;

    let perms = SurrealPermissionRepository::new(db.clone());
    let mut ids = std::collections::HashMap::new();
    for name in [
        "view_roles",
        "manage_roles",
        "view_users",
        "manage_users",
        "view_reports",
        "edit_clients",
    ] {
        let p = perms
            .create(CreatePermission {
                name: name.into(),
                description: String::new(),
            })
            .await
            .unwrap();
        ids.insert(name, p.id);
    }

    let roles = SurrealRoleRepository::new(db.clone());
    let role = |tenant_id: Uuid, name: &str| CreateRole {
        tenant_id,
        name: name.into(),
        description: String::new(),
    };
    let acme_admin = roles.create(role(acme, "Admin")).await.unwrap().id;
    let manager = roles.create(role(acme, "Manager")).await.unwrap().id;
    let globex_admin = roles.create(role(globex, "Admin")).await.unwrap().id;

    let grants = SurrealRolePermissionRepository::new(db.clone());
    for role_id in [acme_admin, globex_admin] {
        for name in ["view_roles", "manage_roles", "view_users", "manage_users"] {
            grants.grant(role_id, ids[name], None).await.unwrap();
        }
    }
    for name in ["view_reports", "edit_clients"] {
        grants.grant(manager, ids[name], None).await.unwrap();
    }

    let users = SurrealUserRepository::new(db.clone());
    let user = |tenant_id: Uuid, role_id: Uuid, name: &str| CreateUser {
        tenant_id,
        role_id,
        name: name.into(),
        email: format!("{name}@example.com"),
        password: PASSWORD.into(),
    };
    users.create(user(acme, acme_admin, "ann")).await.unwrap();
    let bob = users.create(user(acme, manager, "bob")).await.unwrap().id;
    users.create(user(globex, globex_admin, "gus")).await.unwrap();

    let app = router(AppState::new(
        db.clone(),
        auth_config(),
        &AuthzConfig::default(),
    ));

    Fixture {
        db,
        app,
        acme,
        globex,
        acme_admin,
        manager,
        bob,
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn call(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn call_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn login(fx: &Fixture, tenant_id: Uuid, name: &str) -> String {
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "tenant_id": tenant_id,
                "email": format!("{name}@example.com"),
                "password": PASSWORD,
            })
            .to_string(),
        ))
        .unwrap();
    let (status, body) = send(&fx.app, req).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check_is_public() {
    let fx = setup().await;
    let req = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&fx.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let fx = setup().await;
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "tenant_id": fx.acme,
                "email": "bob@example.com",
                "password": "wrong",
            })
            .to_string(),
        ))
        .unwrap();

    let response = fx.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn api_requires_a_bearer_token() {
    let fx = setup().await;
    let uri = format!("/api/roles/{}", fx.manager);

    let req = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let (status, body) = send(&fx.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "missing_token");

    let (status, body) = send(&fx.app, call("GET", &uri, "not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_token");
}

#[tokio::test]
async fn token_from_another_issuer_key_is_rejected() {
    let fx = setup().await;
    let foreign = AuthConfig::new(JwtKey::Hmac("someone-elses-secret".into()));
    let token =
        cpadesk_auth::issue_access_token(fx.bob, fx.acme, fx.manager, &foreign).unwrap();

    let (status, body) = send(
        &fx.app,
        call("GET", &format!("/api/users/{}", fx.bob), &token),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_token");
}

#[tokio::test]
async fn admin_reads_a_role_of_its_tenant() {
    let fx = setup().await;
    let ann = login(&fx, fx.acme, "ann").await;

    let (status, body) = send(&fx.app, call("GET", &format!("/api/roles/{}", fx.manager), &ann)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Manager");

    let (status, body) = send(
        &fx.app,
        call("GET", &format!("/api/roles/{}/permissions", fx.manager), &ann),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["edit_clients", "view_reports"]);
}

#[tokio::test]
async fn missing_permission_is_forbidden_and_audited() {
    let fx = setup().await;
    let bob = login(&fx, fx.acme, "bob").await;

    let (status, body) = send(&fx.app, call("GET", &format!("/api/roles/{}", fx.manager), &bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "missing_permission");
    assert_eq!(body["error"]["message"], "Forbidden: missing permission: view_roles");

    let entries = SurrealAuditLogRepository::new(fx.db.clone())
        .list(fx.acme, Pagination::default())
        .await
        .unwrap();
    let denied = entries
        .items
        .iter()
        .find(|e| e.event_type == AuditEventType::AccessDenied)
        .unwrap();
    assert_eq!(denied.actor_id, Some(fx.bob));
    assert_eq!(denied.target_id, Some(fx.manager));
}

#[tokio::test]
async fn foreign_tenant_records_are_cross_tenant_access() {
    let fx = setup().await;
    let gus = login(&fx, fx.globex, "gus").await;

    let (status, body) = send(&fx.app, call("GET", &format!("/api/roles/{}", fx.manager), &gus)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "cross_tenant_access");

    let (status, body) = send(&fx.app, call("GET", &format!("/api/users/{}", fx.bob), &gus)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "cross_tenant_access");

    let (status, _) = send(
        &fx.app,
        call(
            "PUT",
            &format!("/api/roles/{}/permissions/manage_roles", fx.manager),
            &gus,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&fx.app, call("GET", &format!("/api/roles/{}", Uuid::new_v4()), &gus)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn grant_and_revoke_apply_to_the_next_request() {
    let fx = setup().await;
    let ann = login(&fx, fx.acme, "ann").await;
    let bob = login(&fx, fx.acme, "bob").await;
    let bob_profile = format!("/api/users/{}", fx.bob);
    let grant_uri = format!("/api/roles/{}/permissions/view_users", fx.manager);

    let (status, _) = send(&fx.app, call("GET", &bob_profile, &bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&fx.app, call("PUT", &grant_uri, &ann)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role_id"], json!(fx.manager));

    let (status, body) = send(&fx.app, call("PUT", &grant_uri, &ann)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "already_exists");

    let (status, body) = send(&fx.app, call("GET", &bob_profile, &bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "bob@example.com");
    assert!(body.get("password_hash").is_none());

    let (status, body) = send(&fx.app, call("DELETE", &grant_uri, &ann)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], true);

    let (status, _) = send(&fx.app, call("GET", &bob_profile, &bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&fx.app, call("DELETE", &grant_uri, &ann)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], false);
}

#[tokio::test]
async fn role_reassignment_applies_to_an_issued_token() {
    let fx = setup().await;
    let ann = login(&fx, fx.acme, "ann").await;
    let bob = login(&fx, fx.acme, "bob").await;
    let manager_uri = format!("/api/roles/{}", fx.manager);

    let (status, _) = send(&fx.app, call("GET", &manager_uri, &bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &fx.app,
        call_json(
            "PUT",
            &format!("/api/users/{}/role", fx.bob),
            &ann,
            json!({ "role_id": fx.acme_admin }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role_id"], json!(fx.acme_admin));

    let (status, _) = send(&fx.app, call("GET", &manager_uri, &bob)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn role_in_use_cannot_be_deleted() {
    let fx = setup().await;
    let ann = login(&fx, fx.acme, "ann").await;

    let (status, body) = send(&fx.app, call("DELETE", &format!("/api/roles/{}", fx.manager), &ann)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let spare = SurrealRoleRepository::new(fx.db.clone())
        .create(CreateRole {
            tenant_id: fx.acme,
            name: "Spare".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    let (status, _) = send(&fx.app, call("DELETE", &format!("/api/roles/{}", spare.id), &ann)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn disabled_account_loses_access_immediately() {
    let fx = setup().await;
    let bob = login(&fx, fx.acme, "bob").await;

    SurrealUserRepository::new(fx.db.clone())
        .update(
            fx.acme,
            fx.bob,
            UpdateUser {
                status: Some(UserStatus::Locked),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (status, body) = send(&fx.app, call("GET", &format!("/api/users/{}", fx.bob), &bob)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "account_disabled");
}
