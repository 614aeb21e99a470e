//! Integration tests for the User and AuditLog repositories using
//! in-memory SurrealDB.

use cpadesk_core::error::CpaError;
use cpadesk_core::models::audit::{AuditEventType, CreateAuditLogEntry};
use cpadesk_core::models::role::CreateRole;
use cpadesk_core::models::tenant::CreateTenant;
use cpadesk_core::models::user::{CreateUser, UpdateUser, UserStatus};
use cpadesk_core::repository::{
    AuditLogRepository, Pagination, RoleRepository, TenantRepository, UserRepository,
};
use cpadesk_db::repository::{
    SurrealAuditLogRepository, SurrealRoleRepository, SurrealTenantRepository,
    SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// Helper: tenant with a "Staff" role, returning (tenant_id, role_id).
async fn setup_tenant(db: &Surreal<Db>, name: &str) -> (Uuid, Uuid) {
    let tenant = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant { name: name.into() })
        .await
        .unwrap();
    let role = SurrealRoleRepository::new(db.clone())
        .create(CreateRole {
            tenant_id: tenant.id,
            name: "Staff".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    (tenant.id, role.id)
}

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cpadesk_db::run_migrations(&db).await.unwrap();
    db
}

fn new_user(tenant_id: Uuid, role_id: Uuid, name: &str) -> CreateUser {
    CreateUser {
        tenant_id,
        role_id,
        name: name.into(),
        email: format!("{name}@example.com"),
        password: "correct horse".into(),
    }
}

#[tokio::test]
async fn create_user_hashes_password_and_starts_active() {
    let db = setup().await;
    let (tenant_id, role_id) = setup_tenant(&db, "Acme").await;
    let repo = SurrealUserRepository::with_pepper(db, "pepper".into());

    let bob = repo.create(new_user(tenant_id, role_id, "bob")).await.unwrap();
    assert_eq!(bob.status, UserStatus::Active);
    assert_eq!(bob.role_id, role_id);
    assert!(bob.password_hash.starts_with("$argon2id$"));
    assert!(!bob.password_hash.contains("correct horse"));

    let by_email = repo
        .get_by_email(tenant_id, "bob@example.com")
        .await
        .unwrap();
    assert_eq!(by_email.id, bob.id);
}

#[tokio::test]
async fn user_cannot_hold_a_role_of_another_tenant() {
    let db = setup().await;
    let (acme, _) = setup_tenant(&db, "Acme").await;
    let (_, globex_role) = setup_tenant(&db, "Globex").await;
    let repo = SurrealUserRepository::new(db);

    let err = repo
        .create(new_user(acme, globex_role, "mallory"))
        .await
        .unwrap_err();
    assert!(matches!(err, CpaError::Conflict { .. }), "got {err:?}");

    let err = repo
        .create(new_user(acme, Uuid::new_v4(), "mallory"))
        .await
        .unwrap_err();
    assert!(matches!(err, CpaError::NotFound { ref entity, .. } if entity == "role"));
}

#[tokio::test]
async fn assign_role_replaces_the_single_role() {
    let db = setup().await;
    let (tenant_id, staff) = setup_tenant(&db, "Acme").await;
    let (_, foreign_role) = setup_tenant(&db, "Globex").await;
    let manager = SurrealRoleRepository::new(db.clone())
        .create(CreateRole {
            tenant_id,
            name: "Manager".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    let repo = SurrealUserRepository::new(db);

    let bob = repo.create(new_user(tenant_id, staff, "bob")).await.unwrap();
    assert_eq!(repo.count_with_role(tenant_id, staff).await.unwrap(), 1);

    let bob = repo
        .assign_role(tenant_id, bob.id, manager.id)
        .await
        .unwrap();
    assert_eq!(bob.role_id, manager.id);
    assert_eq!(repo.count_with_role(tenant_id, staff).await.unwrap(), 0);
    assert_eq!(repo.count_with_role(tenant_id, manager.id).await.unwrap(), 1);

    let err = repo
        .assign_role(tenant_id, bob.id, foreign_role)
        .await
        .unwrap_err();
    assert!(matches!(err, CpaError::Conflict { .. }));
    assert_eq!(
        repo.get_by_id(tenant_id, bob.id).await.unwrap().role_id,
        manager.id
    );
}

#[tokio::test]
async fn duplicate_email_within_tenant_is_rejected() {
    let db = setup().await;
    let (acme, acme_role) = setup_tenant(&db, "Acme").await;
    let (globex, globex_role) = setup_tenant(&db, "Globex").await;
    let repo = SurrealUserRepository::new(db);

    repo.create(new_user(acme, acme_role, "bob")).await.unwrap();
    repo.create(new_user(globex, globex_role, "bob"))
        .await
        .unwrap();

    let err = repo
        .create(new_user(acme, acme_role, "bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, CpaError::AlreadyExists { .. }), "got {err:?}");
}

#[tokio::test]
async fn user_reads_are_tenant_scoped() {
    let db = setup().await;
    let (acme, acme_role) = setup_tenant(&db, "Acme").await;
    let (globex, _) = setup_tenant(&db, "Globex").await;
    let repo = SurrealUserRepository::new(db);

    let bob = repo.create(new_user(acme, acme_role, "bob")).await.unwrap();

    assert!(matches!(
        repo.get_by_id(globex, bob.id).await,
        Err(CpaError::NotFound { .. })
    ));
    assert_eq!(repo.owner_tenant(bob.id).await.unwrap(), Some(acme));
    assert_eq!(repo.list(globex, Pagination::default()).await.unwrap().total, 0);
    assert_eq!(repo.list(acme, Pagination::default()).await.unwrap().total, 1);
}

#[tokio::test]
async fn update_and_soft_delete_user() {
    let db = setup().await;
    let (tenant_id, role_id) = setup_tenant(&db, "Acme").await;
    let repo = SurrealUserRepository::new(db);

    let bob = repo.create(new_user(tenant_id, role_id, "bob")).await.unwrap();

    let renamed = repo
        .update(
            tenant_id,
            bob.id,
            UpdateUser {
                name: Some("Robert".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Robert");
    assert_eq!(renamed.email, "bob@example.com");

    repo.delete(tenant_id, bob.id).await.unwrap();
    let deleted = repo.get_by_id(tenant_id, bob.id).await.unwrap();
    assert_eq!(deleted.status, UserStatus::Inactive);

    assert!(matches!(
        repo.delete(tenant_id, Uuid::new_v4()).await,
        Err(CpaError::NotFound { .. })
    ));
}

#[tokio::test]
async fn audit_log_lists_newest_first_per_tenant() {
    let db = setup().await;
    let (acme, role_id) = setup_tenant(&db, "Acme").await;
    let (globex, _) = setup_tenant(&db, "Globex").await;
    let repo = SurrealAuditLogRepository::new(db);
    let actor = Uuid::new_v4();

    let first = repo
        .append(CreateAuditLogEntry {
            tenant_id: acme,
            actor_id: Some(actor),
            event_type: AuditEventType::PermissionGranted,
            target_id: Some(role_id),
            metadata: Some(serde_json::json!({ "permission": "view_reports" })),
        })
        .await
        .unwrap();
    assert_eq!(first.actor_id, Some(actor));
    assert_eq!(first.metadata["permission"], "view_reports");

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    repo.append(CreateAuditLogEntry {
        tenant_id: acme,
        actor_id: None,
        event_type: AuditEventType::RoleDeleted,
        target_id: Some(role_id),
        metadata: None,
    })
    .await
    .unwrap();

    let page = repo.list(acme, Pagination::default()).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].event_type, AuditEventType::RoleDeleted);
    assert_eq!(page.items[1].id, first.id);

    assert_eq!(repo.list(globex, Pagination::default()).await.unwrap().total, 0);
}
