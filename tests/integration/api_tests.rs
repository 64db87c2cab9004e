//! API integration tests
//!
//! Drives the real router with in-memory storage: authentication flow,
//! authorization boundaries and the assignment endpoints.

use axum::http::StatusCode;

use crate::common::{actor_for, create_license, create_user, TestApp};
use seatwise::models::AssignmentTarget;
use seatwise::services::AssignmentService;

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new().await;

    let response = app.get("/api/v1/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");

    let response = app.get("/api/v1/health/ready", None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;

    let response = app.get("/api/v1/licenses", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get("/api/v1/users", Some("not-a-token")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_flow() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    create_user(pool, "alice", &["self_service"]).await;

    let response = app
        .post_json(
            "/api/v1/auth/login",
            serde_json::json!({ "username": "alice", "password": "password123" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["token_type"], "Bearer");
    assert!(response.body["access_token"].as_str().is_some());
    assert_eq!(response.body["user"]["username"], "alice");

    let token = response.body["access_token"].as_str().unwrap().to_string();
    let me = app.get("/api/v1/auth/me", Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["username"], "alice");

    // Wrong password is rejected
    let response = app
        .post_json(
            "/api/v1/auth/login",
            serde_json::json!({ "username": "alice", "password": "nope" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_self_service_activation_via_api() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let alice = create_user(pool, "alice", &["self_service"]).await;
    let token = app.token_for(&alice, &["self_service"]);
    let license = create_license(pool, "Office Suite", 1).await;

    let uri = format!("/api/v1/licenses/{}/activate", license.id);
    let response = app.post_json(&uri, serde_json::json!({}), Some(&token)).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["state"], "active");

    // Second activation by the same user conflicts
    let response = app.post_json(&uri, serde_json::json!({}), Some(&token)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    // Another user finds no seats left
    let bob = create_user(pool, "bob", &["self_service"]).await;
    let bob_token = app.token_for(&bob, &["self_service"]);
    let response = app
        .post_json(&uri, serde_json::json!({}), Some(&bob_token))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(response.body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("No available seats for license")
        || response.body["message"]
            .as_str()
            .unwrap_or_default()
            .contains("no available seats"));

    // Availability reflects the taken seat
    let availability = app
        .get(&format!("/api/v1/licenses/{}/availability", license.id), Some(&token))
        .await;
    assert_eq!(availability.status, StatusCode::OK);
    assert_eq!(availability.body["available_seats"], 0);
}

#[tokio::test]
async fn test_release_by_license_via_api() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let alice = create_user(pool, "alice", &["self_service"]).await;
    let token = app.token_for(&alice, &["self_service"]);
    let license = create_license(pool, "Office Suite", 1).await;

    let activate = format!("/api/v1/licenses/{}/activate", license.id);
    app.post_json(&activate, serde_json::json!({}), Some(&token))
        .await;

    let deactivate = format!("/api/v1/licenses/{}/deactivate", license.id);
    let response = app
        .post_json(&deactivate, serde_json::json!({}), Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["state"], "inactive");

    // Releasing again: no active assignment remains
    let response = app
        .post_json(&deactivate, serde_json::json!({}), Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_assignment_routes_check_path_user() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let admin_actor = actor_for(pool, &admin).await;
    let admin_token = app.token_for(&admin, &["admin"]);
    let alice = create_user(pool, "alice", &[]).await;
    let bob = create_user(pool, "bob", &[]).await;
    let license = create_license(pool, "Office Suite", 5).await;

    let assignment = AssignmentService::new(pool.clone())
        .approve(license.id, AssignmentTarget::User(alice.id), &admin_actor, None)
        .await
        .unwrap();

    // Addressing alice's assignment through bob's path is rejected
    let uri = format!(
        "/api/v1/users/{}/assignments/{}/activate",
        bob.id, assignment.id
    );
    let response = app.post_json(&uri, serde_json::json!({}), Some(&admin_token)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    // The consistent path works
    let uri = format!(
        "/api/v1/users/{}/assignments/{}/activate",
        alice.id, assignment.id
    );
    let response = app.post_json(&uri, serde_json::json!({}), Some(&admin_token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["state"], "active");
}

#[tokio::test]
async fn test_role_endpoints_enforce_admin_protection() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let admin = create_user(pool, "root", &["admin"]).await;
    let admin_token = app.token_for(&admin, &["admin"]);

    let roles = app.get("/api/v1/roles", Some(&admin_token)).await;
    assert_eq!(roles.status, StatusCode::OK);
    let admin_role_id = roles
        .body
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "admin")
        .and_then(|r| r["id"].as_str())
        .unwrap()
        .to_string();

    // Stripping the last administrator conflicts
    let uri = format!("/api/v1/users/{}/roles/{}", admin.id, admin_role_id);
    let response = app.delete(&uri, Some(&admin_token)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(response.body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("administrator"));
}

#[tokio::test]
async fn test_license_crud_requires_admin() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let viewer = create_user(pool, "viewer", &["viewer"]).await;
    let viewer_token = app.token_for(&viewer, &["viewer"]);
    let admin = create_user(pool, "root", &["admin"]).await;
    let admin_token = app.token_for(&admin, &["admin"]);

    let product = app
        .post_json(
            "/api/v1/products",
            serde_json::json!({ "name": "Editor" }),
            Some(&admin_token),
        )
        .await;
    assert_eq!(product.status, StatusCode::CREATED);
    let product_id = product.body["id"].as_str().unwrap().to_string();

    let body = serde_json::json!({
        "product_id": product_id,
        "name": "Editor Pro",
        "seat_count": 10
    });

    let response = app
        .post_json("/api/v1/licenses", body.clone(), Some(&viewer_token))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.post_json("/api/v1/licenses", body, Some(&admin_token)).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["seat_count"], 10);

    // Zero seats is a validation error
    let response = app
        .post_json(
            "/api/v1/licenses",
            serde_json::json!({
                "product_id": response.body["product_id"],
                "name": "Broken",
                "seat_count": 0
            }),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_audit_endpoints_are_admin_only() {
    let app = TestApp::new().await;
    let pool = &app.state.db;

    let viewer = create_user(pool, "viewer", &["viewer"]).await;
    let viewer_token = app.token_for(&viewer, &["viewer"]);
    let admin = create_user(pool, "root", &["admin"]).await;
    let admin_token = app.token_for(&admin, &["admin"]);

    let response = app.get("/api/v1/audit/security", Some(&viewer_token)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.get("/api/v1/audit/security", Some(&admin_token)).await;
    assert_eq!(response.status, StatusCode::OK);
    // User creation left a trail
    assert!(!response.body.as_array().unwrap().is_empty());
}
