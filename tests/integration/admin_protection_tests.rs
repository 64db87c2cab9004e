//! Admin protection tests
//!
//! The count of users holding the administrator role must never drop to
//! zero through role removal, role replacement, deactivation or deletion.

use seatwise::db::UserRepository;
use seatwise::services::{AdminGuard, LicensingError};

use crate::common::{actor_for, create_user, TestApp};

#[tokio::test]
async fn test_sole_admin_cannot_remove_own_admin_role() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let actor = actor_for(pool, &admin).await;

    let repo = UserRepository::new(pool);
    let admin_role = repo.find_role_by_name("admin").await.unwrap().unwrap();

    let err = AdminGuard::new(pool.clone())
        .remove_role(admin.id, admin_role.id, &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::AdminProtection(_)));

    // Role data unchanged
    assert_eq!(repo.count_administrators().await.unwrap(), 1);
    let roles = repo.get_user_role_names(admin.id).await.unwrap();
    assert!(roles.contains(&"admin".to_string()));
}

#[tokio::test]
async fn test_admin_role_removable_with_two_admins() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let first = create_user(pool, "root", &["admin"]).await;
    let second = create_user(pool, "backup", &["admin"]).await;
    let actor = actor_for(pool, &first).await;

    let repo = UserRepository::new(pool);
    let admin_role = repo.find_role_by_name("admin").await.unwrap().unwrap();
    assert_eq!(repo.count_administrators().await.unwrap(), 2);

    AdminGuard::new(pool.clone())
        .remove_role(second.id, admin_role.id, &actor)
        .await
        .unwrap();

    assert_eq!(repo.count_administrators().await.unwrap(), 1);
}

#[tokio::test]
async fn test_set_roles_cannot_strip_last_admin() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let actor = actor_for(pool, &admin).await;

    let repo = UserRepository::new(pool);
    let viewer_role = repo.find_role_by_name("viewer").await.unwrap().unwrap();

    let err = AdminGuard::new(pool.clone())
        .set_roles(admin.id, &[viewer_role.id], &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::AdminProtection(_)));

    let roles = repo.get_user_role_names(admin.id).await.unwrap();
    assert_eq!(roles, vec!["admin".to_string()]);
}

#[tokio::test]
async fn test_set_roles_keeping_admin_is_allowed() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let actor = actor_for(pool, &admin).await;

    let repo = UserRepository::new(pool);
    let admin_role = repo.find_role_by_name("admin").await.unwrap().unwrap();
    let self_service = repo.find_role_by_name("self_service").await.unwrap().unwrap();

    let updated = AdminGuard::new(pool.clone())
        .set_roles(admin.id, &[admin_role.id, self_service.id], &actor)
        .await
        .unwrap();

    let roles = updated.roles.unwrap();
    assert!(roles.contains(&"admin".to_string()));
    assert!(roles.contains(&"self_service".to_string()));
}

#[tokio::test]
async fn test_set_roles_on_non_admin_is_unguarded() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let actor = actor_for(pool, &admin).await;
    let user = create_user(pool, "alice", &["viewer"]).await;

    let repo = UserRepository::new(pool);
    let self_service = repo.find_role_by_name("self_service").await.unwrap().unwrap();

    let updated = AdminGuard::new(pool.clone())
        .set_roles(user.id, &[self_service.id], &actor)
        .await
        .unwrap();

    assert_eq!(updated.roles.unwrap(), vec!["self_service".to_string()]);
}

#[tokio::test]
async fn test_last_admin_cannot_be_deactivated() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let actor = actor_for(pool, &admin).await;

    let err = AdminGuard::new(pool.clone())
        .deactivate_user(admin.id, &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::AdminProtection(_)));

    let user = UserRepository::new(pool).find(admin.id).await.unwrap().unwrap();
    assert!(user.is_active);
}

#[tokio::test]
async fn test_last_admin_cannot_be_deleted() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let actor = actor_for(pool, &admin).await;

    let err = AdminGuard::new(pool.clone())
        .delete_user(admin.id, &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::AdminProtection(_)));

    assert!(UserRepository::new(pool)
        .find(admin.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_second_admin_can_be_deleted() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let first = create_user(pool, "root", &["admin"]).await;
    let second = create_user(pool, "backup", &["admin"]).await;
    let actor = actor_for(pool, &first).await;

    AdminGuard::new(pool.clone())
        .delete_user(second.id, &actor)
        .await
        .unwrap();

    let repo = UserRepository::new(pool);
    assert_eq!(repo.count_administrators().await.unwrap(), 1);
    assert!(repo.find(second.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_admin_cannot_drive_role_changes() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let _admin = create_user(pool, "root", &["admin"]).await;
    let user = create_user(pool, "alice", &["viewer"]).await;
    let actor = actor_for(pool, &user).await;

    let repo = UserRepository::new(pool);
    let viewer_role = repo.find_role_by_name("viewer").await.unwrap().unwrap();

    let err = AdminGuard::new(pool.clone())
        .remove_role(user.id, viewer_role.id, &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::NotAuthorized(_)));
}

#[tokio::test]
async fn test_deactivated_admins_do_not_count_toward_floor() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let first = create_user(pool, "root", &["admin"]).await;
    let second = create_user(pool, "backup", &["admin"]).await;
    let actor = actor_for(pool, &first).await;

    let guard = AdminGuard::new(pool.clone());
    guard.deactivate_user(second.id, &actor).await.unwrap();

    // The remaining active admin is now the last one standing
    let err = guard.deactivate_user(first.id, &actor).await.unwrap_err();
    assert!(matches!(err, LicensingError::AdminProtection(_)));
}
