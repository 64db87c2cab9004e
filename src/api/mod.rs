//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{routing::get, Router};

use crate::middleware::AuthUser;
use crate::models::SecurityAction;
use crate::services::AuditService;
use crate::utils::{AppError, AppResult};
use crate::AppState;

mod assignments;
mod audit_logs;
mod auth;
mod devices;
mod health;
mod licenses;
mod products;
mod roles;
mod users;

pub use health::*;

/// Public API routes (no authentication required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Health check endpoints
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        // Authentication endpoints (no auth required)
        .nest("/auth", auth::public_routes())
}

/// Protected API routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        // Protected auth endpoints (change-password, me)
        .nest("/auth", auth::protected_routes())
        // Resource endpoints
        .nest("/products", products::routes())
        .nest("/licenses", licenses::routes())
        .nest("/users", users::routes())
        .nest("/devices", devices::routes())
        .nest("/roles", roles::routes())
        // Assignment operations addressed by assignment id
        .nest("/assignments", assignments::routes())
        // Audit trails
        .nest("/audit", audit_logs::routes())
}

/// Create the full API router (public + protected; useful for tests)
pub fn routes() -> Router<AppState> {
    public_routes().merge(protected_routes())
}

/// Reject non-administrators.
pub(crate) fn require_admin(auth_user: &AuthUser) -> AppResult<()> {
    if auth_user.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("Administrator role required"))
    }
}

/// Security history for already-committed CRUD mutations is best-effort: a
/// failed log write must not undo the mutation it records.
pub(crate) async fn log_security_best_effort(
    state: &AppState,
    action: SecurityAction,
    object: &str,
    auth_user: &AuthUser,
    details: Option<String>,
) {
    let audit = AuditService::new(state.db.clone());
    if let Err(e) = audit
        .log_security(action, object, &auth_user.to_actor(), details)
        .await
    {
        tracing::warn!("Failed to write security log entry: {}", e);
    }
}
