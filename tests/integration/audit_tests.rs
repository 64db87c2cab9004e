//! Audit trail tests
//!
//! Every successful lifecycle transition produces exactly one entry with
//! the correct action tag and denormalized identity; failed transitions
//! produce none, and a failed history write aborts the transition.

use seatwise::db::AuditRepository;
use seatwise::models::{AssignmentLogQuery, AssignmentTarget, SecurityLogQuery};
use seatwise::services::{AssignmentService, AuthService, LicensingError};

use crate::common::{
    active_assignment_count, actor_for, create_license, create_user, TestApp,
};

#[tokio::test]
async fn test_lifecycle_writes_one_entry_per_transition() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let admin_actor = actor_for(pool, &admin).await;
    let alice = create_user(pool, "alice", &["self_service"]).await;
    let alice_actor = actor_for(pool, &alice).await;
    let license = create_license(pool, "Office Suite", 5).await;

    let service = AssignmentService::new(pool.clone());

    // user activate -> user deactivate -> admin approve -> admin activate
    // -> admin deactivate -> admin cancel
    let a = service.activate(license.id, &alice_actor, None).await.unwrap();
    service.deactivate(a.id, &alice_actor).await.unwrap();
    let b = service
        .approve(license.id, AssignmentTarget::User(alice.id), &admin_actor, None)
        .await
        .unwrap();
    service.admin_activate(b.id, &admin_actor).await.unwrap();
    service.deactivate(b.id, &admin_actor).await.unwrap();
    service.cancel(b.id, &admin_actor).await.unwrap();

    let entries = AuditRepository::new(pool)
        .list_assignment_log(&AssignmentLogQuery {
            license_id: Some(license.id),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(entries.len(), 6);

    let mut actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    actions.sort_unstable();
    assert_eq!(
        actions,
        vec![
            "admin_activated",
            "admin_approved",
            "admin_cancelled",
            "admin_deactivated",
            "user_activated",
            "user_deactivated",
        ]
    );

    // Denormalized identity is captured on every entry
    for entry in &entries {
        assert_eq!(entry.license_name, "Office Suite");
        assert_eq!(entry.username, "alice");
        assert_eq!(entry.email, "alice@example.com");
    }

    // The cancellation entry survives the hard delete with a null reference
    let cancelled = entries
        .iter()
        .find(|e| e.action == "admin_cancelled")
        .unwrap();
    assert!(cancelled.assignment_id.is_none());
}

#[tokio::test]
async fn test_failed_log_write_aborts_the_transition() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let alice = create_user(pool, "alice", &["self_service"]).await;
    let alice_actor = actor_for(pool, &alice).await;
    let license = create_license(pool, "Office Suite", 5).await;

    // Empty license name makes the denormalized history entry invalid, so
    // the audit write inside the activation transaction must fail.
    sqlx::query("UPDATE licenses SET name = '' WHERE id = ?")
        .bind(license.id.to_string())
        .execute(pool)
        .await
        .unwrap();

    let err = AssignmentService::new(pool.clone())
        .activate(license.id, &alice_actor, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::Validation(_)));

    // All-or-nothing: the assignment insert was rolled back
    assert_eq!(active_assignment_count(pool, license.id).await, 0);
}

#[tokio::test]
async fn test_failed_login_is_recorded_for_unknown_actor() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    create_user(pool, "alice", &["self_service"]).await;

    let auth = AuthService::new(pool.clone());
    let result = auth.authenticate("alice", "wrong password").await.unwrap();
    assert!(result.is_none());

    let entries = AuditRepository::new(pool)
        .list_security_log(&SecurityLogQuery {
            action: Some("login_failure".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].username, "unknown");
    assert!(entries[0].user_id.is_none());
    assert_eq!(entries[0].object, "alice");
}

#[tokio::test]
async fn test_successful_login_is_recorded_with_identity() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let alice = create_user(pool, "alice", &["self_service"]).await;

    let auth = AuthService::new(pool.clone());
    auth.authenticate("alice", "password123").await.unwrap().unwrap();

    let entries = AuditRepository::new(pool)
        .list_security_log(&SecurityLogQuery {
            action: Some("login_success".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].user_id, Some(alice.id));
    assert_eq!(entries[0].username, "alice");
}

#[tokio::test]
async fn test_purge_by_subject() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let alice = create_user(pool, "alice", &["self_service"]).await;
    let bob = create_user(pool, "bob", &["self_service"]).await;
    let license = create_license(pool, "Office Suite", 5).await;

    let service = AssignmentService::new(pool.clone());
    let alice_actor = actor_for(pool, &alice).await;
    let bob_actor = actor_for(pool, &bob).await;
    service.activate(license.id, &alice_actor, None).await.unwrap();
    service.activate(license.id, &bob_actor, None).await.unwrap();

    let repo = AuditRepository::new(pool);
    let purged = repo.purge_assignment_log_for_user(alice.id).await.unwrap();
    assert_eq!(purged, 1);

    let remaining = repo
        .list_assignment_log(&AssignmentLogQuery::default())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].username, "bob");
}

#[tokio::test]
async fn test_role_changes_are_security_logged() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let first = create_user(pool, "root", &["admin"]).await;
    let second = create_user(pool, "backup", &["admin"]).await;
    let actor = actor_for(pool, &first).await;

    let admin_role = seatwise::db::UserRepository::new(pool)
        .find_role_by_name("admin")
        .await
        .unwrap()
        .unwrap();

    seatwise::services::AdminGuard::new(pool.clone())
        .remove_role(second.id, admin_role.id, &actor)
        .await
        .unwrap();

    let entries = AuditRepository::new(pool)
        .list_security_log(&SecurityLogQuery {
            action: Some("user_updated".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].object, "backup");
    assert_eq!(entries[0].user_id, Some(first.id));
    assert!(entries[0]
        .details
        .as_deref()
        .unwrap_or_default()
        .contains("admin"));
}
