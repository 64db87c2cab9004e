//! Audit trail API endpoints
//!
//! Read access to both histories plus the administrative purge by subject.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::{
    api::require_admin,
    db::AuditRepository,
    middleware::AuthUser,
    models::{
        AssignmentLogEntry, AssignmentLogQuery, PurgeQuery, SecurityLogEntry, SecurityLogQuery,
    },
    utils::AppResult,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/assignments",
            get(list_assignment_log).delete(purge_assignment_log),
        )
        .route(
            "/security",
            get(list_security_log).delete(purge_security_log),
        )
}

async fn list_assignment_log(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<AssignmentLogQuery>,
) -> AppResult<Json<Vec<AssignmentLogEntry>>> {
    require_admin(&auth_user)?;

    let logs = AuditRepository::new(&state.db)
        .list_assignment_log(&query)
        .await?;
    Ok(Json(logs))
}

async fn list_security_log(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<SecurityLogQuery>,
) -> AppResult<Json<Vec<SecurityLogEntry>>> {
    require_admin(&auth_user)?;

    let logs = AuditRepository::new(&state.db)
        .list_security_log(&query)
        .await?;
    Ok(Json(logs))
}

/// Purge a user's assignment history
///
/// DELETE /api/v1/audit/assignments?user_id=...
async fn purge_assignment_log(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<PurgeQuery>,
) -> AppResult<Json<serde_json::Value>> {
    require_admin(&auth_user)?;

    let purged = AuditRepository::new(&state.db)
        .purge_assignment_log_for_user(query.user_id)
        .await?;
    Ok(Json(serde_json::json!({ "purged": purged })))
}

/// Purge a user's security history
///
/// DELETE /api/v1/audit/security?user_id=...
async fn purge_security_log(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<PurgeQuery>,
) -> AppResult<Json<serde_json::Value>> {
    require_admin(&auth_user)?;

    let purged = AuditRepository::new(&state.db)
        .purge_security_log_for_user(query.user_id)
        .await?;
    Ok(Json(serde_json::json!({ "purged": purged })))
}
