//! Assignment API endpoints addressed by assignment id

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    middleware::AuthUser,
    models::Assignment,
    services::{AssignmentService, LicensingError},
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_assignment))
        .route("/{id}/deactivate", post(deactivate))
}

async fn get_assignment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Assignment>> {
    let assignment = AssignmentService::new(state.db.clone())
        .find(id)
        .await?
        .ok_or_else(|| AppError::from(LicensingError::NotFound("Assignment".to_string())))?;

    if !auth_user.is_admin() && !assignment.belongs_to_user(auth_user.id) {
        return Err(AppError::forbidden("Assignment belongs to another user"));
    }

    Ok(Json(assignment))
}

/// Release a seat by assignment id. Administrators may release any
/// assignment, users only their own.
///
/// POST /api/v1/assignments/{id}/deactivate
async fn deactivate(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Assignment>> {
    let assignment = AssignmentService::new(state.db.clone())
        .deactivate(id, &auth_user.to_actor())
        .await?;
    Ok(Json(assignment))
}
