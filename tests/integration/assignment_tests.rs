//! Assignment lifecycle tests
//!
//! Exercises the seat invariant, duplicate prevention, state machine and
//! administrative override paths through the service layer.

use seatwise::models::{AssignmentState, AssignmentTarget, LicenseStatus, UpdateLicenseRequest};
use seatwise::services::{AssignmentService, LicensingError};

use crate::common::{
    active_assignment_count, actor_for, create_license, create_user, TestApp,
};

#[tokio::test]
async fn test_activation_takes_a_seat() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let user = create_user(pool, "alice", &["self_service"]).await;
    let actor = actor_for(pool, &user).await;
    let license = create_license(pool, "Office Suite", 3).await;

    let service = AssignmentService::new(pool.clone());
    let assignment = service.activate(license.id, &actor, None).await.unwrap();

    assert_eq!(assignment.state, AssignmentState::Active);
    assert_eq!(assignment.user_id, Some(user.id));
    assert_eq!(assignment.license_id, license.id);

    let availability = service.availability(license.id).await.unwrap();
    assert_eq!(availability.active_assignments, 1);
    assert_eq!(availability.available_seats, 2);
}

#[tokio::test]
async fn test_last_seat_exhaustion() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let alice = create_user(pool, "alice", &["self_service"]).await;
    let bob = create_user(pool, "bob", &["self_service"]).await;
    let license = create_license(pool, "Single Seat", 1).await;

    let service = AssignmentService::new(pool.clone());

    let alice_actor = actor_for(pool, &alice).await;
    service.activate(license.id, &alice_actor, None).await.unwrap();

    let availability = service.availability(license.id).await.unwrap();
    assert_eq!(availability.available_seats, 0);

    let bob_actor = actor_for(pool, &bob).await;
    let err = service.activate(license.id, &bob_actor, None).await.unwrap_err();
    assert!(matches!(err, LicensingError::NotAvailable(_, _)));

    // Seat invariant holds
    assert_eq!(active_assignment_count(pool, license.id).await, 1);
}

#[tokio::test]
async fn test_duplicate_activation_is_rejected() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let user = create_user(pool, "alice", &["self_service"]).await;
    let actor = actor_for(pool, &user).await;
    let license = create_license(pool, "Office Suite", 5).await;

    let service = AssignmentService::new(pool.clone());
    service.activate(license.id, &actor, None).await.unwrap();

    let err = service.activate(license.id, &actor, None).await.unwrap_err();
    assert!(matches!(err, LicensingError::AlreadyAssigned(_)));

    assert_eq!(active_assignment_count(pool, license.id).await, 1);
}

#[tokio::test]
async fn test_activation_requires_self_service_role() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let user = create_user(pool, "viewer", &["viewer"]).await;
    let actor = actor_for(pool, &user).await;
    let license = create_license(pool, "Office Suite", 5).await;

    let err = AssignmentService::new(pool.clone())
        .activate(license.id, &actor, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::NotAuthorized(_)));
}

#[tokio::test]
async fn test_expired_license_fails_before_seat_check() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let user = create_user(pool, "alice", &["self_service"]).await;
    let actor = actor_for(pool, &user).await;
    let license = create_license(pool, "Old License", 5).await;

    seatwise::db::LicenseRepository::new(pool)
        .update(
            license.id,
            &UpdateLicenseRequest {
                name: None,
                seat_count: None,
                status: Some(LicenseStatus::Expired),
                expire_date: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let err = AssignmentService::new(pool.clone())
        .activate(license.id, &actor, None)
        .await
        .unwrap_err();

    match err {
        LicensingError::NotAvailable(id, reason) => {
            assert_eq!(id, license.id);
            assert!(reason.contains("expired"));
        }
        other => panic!("Expected NotAvailable, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_activation_on_missing_license_is_not_found() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let user = create_user(pool, "alice", &["self_service"]).await;
    let actor = actor_for(pool, &user).await;

    let err = AssignmentService::new(pool.clone())
        .activate(uuid::Uuid::new_v4(), &actor, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::NotFound(_)));
}

#[tokio::test]
async fn test_deactivate_releases_the_seat() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let user = create_user(pool, "alice", &["self_service"]).await;
    let actor = actor_for(pool, &user).await;
    let license = create_license(pool, "Office Suite", 1).await;

    let service = AssignmentService::new(pool.clone());
    let assignment = service.activate(license.id, &actor, None).await.unwrap();

    let released = service.deactivate(assignment.id, &actor).await.unwrap();
    assert_eq!(released.state, AssignmentState::Inactive);
    assert_eq!(active_assignment_count(pool, license.id).await, 0);

    // The freed seat can be taken again
    let bob = create_user(pool, "bob", &["self_service"]).await;
    let bob_actor = actor_for(pool, &bob).await;
    service.activate(license.id, &bob_actor, None).await.unwrap();
}

#[tokio::test]
async fn test_deactivating_inactive_assignment_is_an_error() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let user = create_user(pool, "alice", &["self_service"]).await;
    let actor = actor_for(pool, &user).await;
    let license = create_license(pool, "Office Suite", 2).await;

    let service = AssignmentService::new(pool.clone());
    let assignment = service.activate(license.id, &actor, None).await.unwrap();
    service.deactivate(assignment.id, &actor).await.unwrap();

    let before = crate::common::assignment_log_count(pool, license.id).await;

    // Idempotence is rejected, not silently accepted
    let err = service.deactivate(assignment.id, &actor).await.unwrap_err();
    assert!(matches!(err, LicensingError::Service(_)));

    // No new history entry for the failed transition
    assert_eq!(
        crate::common::assignment_log_count(pool, license.id).await,
        before
    );
}

#[tokio::test]
async fn test_deactivate_requires_ownership_or_admin() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let alice = create_user(pool, "alice", &["self_service"]).await;
    let mallory = create_user(pool, "mallory", &["self_service"]).await;
    let license = create_license(pool, "Office Suite", 5).await;

    let service = AssignmentService::new(pool.clone());
    let alice_actor = actor_for(pool, &alice).await;
    let assignment = service.activate(license.id, &alice_actor, None).await.unwrap();

    let mallory_actor = actor_for(pool, &mallory).await;
    let err = service
        .deactivate(assignment.id, &mallory_actor)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::NotAuthorized(_)));

    // An administrator may release any assignment
    let admin = create_user(pool, "root", &["admin"]).await;
    let admin_actor = actor_for(pool, &admin).await;
    service.deactivate(assignment.id, &admin_actor).await.unwrap();
}

#[tokio::test]
async fn test_admin_approval_skips_seat_checks() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let admin_actor = actor_for(pool, &admin).await;
    let alice = create_user(pool, "alice", &[]).await;
    let license = create_license(pool, "Single Seat", 1).await;

    let service = AssignmentService::new(pool.clone());

    // Fill the only seat
    let bob = create_user(pool, "bob", &["self_service"]).await;
    let bob_actor = actor_for(pool, &bob).await;
    service.activate(license.id, &bob_actor, None).await.unwrap();

    // Pre-approval still succeeds: it takes no seat
    let approved = service
        .approve(license.id, AssignmentTarget::User(alice.id), &admin_actor, None)
        .await
        .unwrap();
    assert_eq!(approved.state, AssignmentState::Inactive);
    assert_eq!(active_assignment_count(pool, license.id).await, 1);

    // Activating the approval is still capacity-guarded
    let err = service
        .admin_activate(approved.id, &admin_actor)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::NotAvailable(_, _)));

    // After the seat frees up the approval can be activated
    let bobs = service.list_for_user(bob.id, &admin_actor).await.unwrap();
    service.deactivate(bobs[0].id, &admin_actor).await.unwrap();

    let activated = service.admin_activate(approved.id, &admin_actor).await.unwrap();
    assert_eq!(activated.state, AssignmentState::Active);
}

#[tokio::test]
async fn test_approve_requires_admin() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let user = create_user(pool, "alice", &["self_service"]).await;
    let actor = actor_for(pool, &user).await;
    let license = create_license(pool, "Office Suite", 5).await;

    let err = AssignmentService::new(pool.clone())
        .approve(license.id, AssignmentTarget::User(user.id), &actor, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LicensingError::NotAuthorized(_)));
}

#[tokio::test]
async fn test_cancel_only_from_inactive() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let admin_actor = actor_for(pool, &admin).await;
    let alice = create_user(pool, "alice", &["self_service"]).await;
    let alice_actor = actor_for(pool, &alice).await;
    let license = create_license(pool, "Office Suite", 5).await;

    let service = AssignmentService::new(pool.clone());
    let assignment = service.activate(license.id, &alice_actor, None).await.unwrap();

    // Active assignments cannot be cancelled
    let err = service.cancel(assignment.id, &admin_actor).await.unwrap_err();
    assert!(matches!(err, LicensingError::Service(_)));

    service.deactivate(assignment.id, &admin_actor).await.unwrap();
    service.cancel(assignment.id, &admin_actor).await.unwrap();

    assert!(service.find(assignment.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_device_assignments_count_against_seats() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let admin_actor = actor_for(pool, &admin).await;
    let license = create_license(pool, "Device License", 1).await;

    let device = seatwise::db::DeviceRepository::new(pool)
        .create(&seatwise::models::CreateDeviceRequest {
            name: "kiosk-01".to_string(),
            serial: None,
        })
        .await
        .unwrap();

    let service = AssignmentService::new(pool.clone());
    let approved = service
        .approve(
            license.id,
            AssignmentTarget::Device(device.id),
            &admin_actor,
            None,
        )
        .await
        .unwrap();

    let activated = service.admin_activate(approved.id, &admin_actor).await.unwrap();
    assert_eq!(activated.device_id, Some(device.id));
    assert_eq!(activated.user_id, None);

    // The device holds the only seat now
    let alice = create_user(pool, "alice", &["self_service"]).await;
    let alice_actor = actor_for(pool, &alice).await;
    let err = service.activate(license.id, &alice_actor, None).await.unwrap_err();
    assert!(matches!(err, LicensingError::NotAvailable(_, _)));
}
