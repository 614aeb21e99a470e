//! Integration tests for the Tenant, Permission and Role repositories
//! using in-memory SurrealDB.

use cpadesk_core::error::CpaError;
use cpadesk_core::models::permission::{CreatePermission, UpdatePermission};
use cpadesk_core::models::role::{CreateRole, UpdateRole};
use cpadesk_core::models::tenant::{CreateTenant, TenantStatus, UpdateTenant};
use cpadesk_core::repository::{
    Pagination, PermissionRepository, RoleRepository, TenantRepository,
};
use cpadesk_db::DbError;
use cpadesk_db::repository::{
    SurrealPermissionRepository, SurrealRoleRepository, SurrealTenantRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cpadesk_db::run_migrations(&db).await.unwrap();
    db
}

async fn tenant(db: &Surreal<Db>, name: &str) -> Uuid {
    SurrealTenantRepository::new(db.clone())
        .create(CreateTenant { name: name.into() })
        .await
        .unwrap()
        .id
}

// -----------------------------------------------------------------------
// Tenant
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_get_and_suspend_tenant() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let acme = repo
        .create(CreateTenant {
            name: "Acme".into(),
        })
        .await
        .unwrap();
    assert_eq!(acme.status, TenantStatus::Active);

    let fetched = repo.get_by_id(acme.id).await.unwrap();
    assert_eq!(fetched.name, "Acme");

    let suspended = repo
        .update(
            acme.id,
            UpdateTenant {
                status: Some(TenantStatus::Suspended),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(suspended.status, TenantStatus::Suspended);
    assert_eq!(suspended.name, "Acme");
}

#[tokio::test]
async fn duplicate_tenant_name_is_rejected() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    repo.create(CreateTenant {
        name: "Acme".into(),
    })
    .await
    .unwrap();
    let err = repo
        .create(CreateTenant {
            name: "Acme".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CpaError::AlreadyExists { .. }), "got {err:?}");
}

#[tokio::test]
async fn missing_tenant_is_not_found() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CpaError::NotFound { .. }));
}

#[tokio::test]
async fn deleting_a_missing_tenant_is_not_found() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db.clone());

    let err = repo.delete(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CpaError::NotFound { ref entity, .. } if entity == "tenant"));

    let acme = tenant(&db, "Acme").await;
    repo.delete(acme).await.unwrap();
    let err = repo.delete(acme).await.unwrap_err();
    assert!(matches!(err, CpaError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn malformed_query_is_a_permanent_failure() {
    let db = setup().await;

    let driver = db.query("SELEC nonsense FRM tenant").await.unwrap_err();
    let err: CpaError = DbError::from(driver).into();
    assert!(matches!(err, CpaError::Database(_)), "got {err:?}");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn list_tenants_paginates() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    for name in ["Acme", "Globex", "Initech"] {
        repo.create(CreateTenant { name: name.into() })
            .await
            .unwrap();
    }

    let page = repo
        .list(Pagination {
            offset: 0,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);

    let rest = repo
        .list(Pagination {
            offset: 2,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(rest.items.len(), 1);
}

// -----------------------------------------------------------------------
// Permission
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_and_lookup_permission_by_name() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    let perm = repo
        .create(CreatePermission {
            name: "view_reports".into(),
            description: "Read financial reports".into(),
        })
        .await
        .unwrap();

    let by_name = repo.get_by_name("view_reports").await.unwrap();
    assert_eq!(by_name.id, perm.id);

    let by_id = repo.get_by_id(perm.id).await.unwrap();
    assert_eq!(by_id.description, "Read financial reports");
}

#[tokio::test]
async fn permission_names_are_validated_and_unique() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    let err = repo
        .create(CreatePermission {
            name: "  ".into(),
            description: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CpaError::Validation { .. }));

    repo.create(CreatePermission {
        name: "edit_clients".into(),
        description: String::new(),
    })
    .await
    .unwrap();
    let err = repo
        .create(CreatePermission {
            name: "edit_clients".into(),
            description: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CpaError::AlreadyExists { .. }), "got {err:?}");
}

#[tokio::test]
async fn unreferenced_permission_can_be_renamed_and_deleted() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    let perm = repo
        .create(CreatePermission {
            name: "view_report".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    let renamed = repo
        .update(
            perm.id,
            UpdatePermission {
                name: Some("view_reports".into()),
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "view_reports");

    repo.delete(perm.id).await.unwrap();
    assert!(matches!(
        repo.get_by_id(perm.id).await,
        Err(CpaError::NotFound { .. })
    ));
}

// -----------------------------------------------------------------------
// Role
// -----------------------------------------------------------------------

#[tokio::test]
async fn role_requires_existing_tenant() {
    let db = setup().await;
    let repo = SurrealRoleRepository::new(db);

    let err = repo
        .create(CreateRole {
            tenant_id: Uuid::new_v4(),
            name: "Manager".into(),
            description: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CpaError::NotFound { ref entity, .. } if entity == "tenant"));
}

#[tokio::test]
async fn role_names_are_unique_per_tenant_only() {
    let db = setup().await;
    let acme = tenant(&db, "Acme").await;
    let globex = tenant(&db, "Globex").await;
    let repo = SurrealRoleRepository::new(db);

    let manager = |tenant_id| CreateRole {
        tenant_id,
        name: "Manager".into(),
        description: String::new(),
    };

    repo.create(manager(acme)).await.unwrap();
    repo.create(manager(globex)).await.unwrap();

    let err = repo.create(manager(acme)).await.unwrap_err();
    assert!(matches!(err, CpaError::AlreadyExists { .. }), "got {err:?}");
}

#[tokio::test]
async fn role_reads_are_tenant_scoped() {
    let db = setup().await;
    let acme = tenant(&db, "Acme").await;
    let globex = tenant(&db, "Globex").await;
    let repo = SurrealRoleRepository::new(db);

    let role = repo
        .create(CreateRole {
            tenant_id: acme,
            name: "Manager".into(),
            description: "Runs the practice".into(),
        })
        .await
        .unwrap();

    assert_eq!(repo.get_by_id(acme, role.id).await.unwrap().name, "Manager");
    assert_eq!(
        repo.get_by_name(acme, "Manager").await.unwrap().id,
        role.id
    );

    // Another tenant sees nothing, but the owner lookup still resolves.
    assert!(matches!(
        repo.get_by_id(globex, role.id).await,
        Err(CpaError::NotFound { .. })
    ));
    assert!(matches!(
        repo.update(
            globex,
            role.id,
            UpdateRole {
                name: Some("Hijacked".into()),
                description: None,
            },
        )
        .await,
        Err(CpaError::NotFound { .. })
    ));
    assert_eq!(repo.owner_tenant(role.id).await.unwrap(), Some(acme));
    assert_eq!(repo.owner_tenant(Uuid::new_v4()).await.unwrap(), None);

    let listed = repo.list(globex, Pagination::default()).await.unwrap();
    assert_eq!(listed.total, 0);
    assert!(listed.items.is_empty());
}
