//! Seed data helpers for integration tests

use uuid::Uuid;

use seatwise::{
    db::{DbPool, LicenseRepository, ProductRepository, UserRepository},
    models::{Actor, CreateLicenseRequest, CreateProductRequest, License, User},
    services::AuthService,
};

/// Create a user holding the given roles and return it.
pub async fn create_user(pool: &DbPool, username: &str, roles: &[&str]) -> User {
    let repo = UserRepository::new(pool);

    let mut role_ids = Vec::new();
    for role in roles {
        let role = repo
            .find_role_by_name(role)
            .await
            .expect("role query failed")
            .unwrap_or_else(|| panic!("role {} not seeded", role));
        role_ids.push(role.id);
    }

    AuthService::new(pool.clone())
        .create_user(
            username,
            &format!("{}@example.com", username),
            "password123",
            &role_ids,
            &Actor::system(),
        )
        .await
        .expect("Failed to create test user")
}

/// The acting principal for a seeded user.
pub async fn actor_for(pool: &DbPool, user: &User) -> Actor {
    let roles = UserRepository::new(pool)
        .get_user_role_names(user.id)
        .await
        .expect("Failed to fetch roles");
    Actor::new(user.id, user.username.clone(), user.email.clone(), roles)
}

/// Create a product and a license with the given seat count.
pub async fn create_license(pool: &DbPool, name: &str, seat_count: i64) -> License {
    let product = ProductRepository::new(pool)
        .create(&CreateProductRequest {
            name: format!("{} Product", name),
            vendor: None,
            description: None,
        })
        .await
        .expect("Failed to create test product");

    LicenseRepository::new(pool)
        .create(&CreateLicenseRequest {
            product_id: product.id,
            name: name.to_string(),
            seat_count,
            expire_date: None,
            notes: None,
        })
        .await
        .expect("Failed to create test license")
}

/// Count rows in the assignment history for a license.
pub async fn assignment_log_count(pool: &DbPool, license_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM assignment_log WHERE license_id = ?")
        .bind(license_id.to_string())
        .fetch_one(pool)
        .await
        .expect("Failed to count assignment log entries")
}

/// Count active assignments for a license.
pub async fn active_assignment_count(pool: &DbPool, license_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM assignments WHERE license_id = ? AND state = 'active'")
        .bind(license_id.to_string())
        .fetch_one(pool)
        .await
        .expect("Failed to count active assignments")
}
