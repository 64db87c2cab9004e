//! License management API endpoints
//!
//! Administrative CRUD plus the self-service seat activation and release
//! entry points.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{log_security_best_effort, require_admin},
    db::LicenseRepository,
    middleware::AuthUser,
    models::{
        ActivateRequest, Assignment, CreateLicenseRequest, License, LicenseAvailability,
        SecurityAction, UpdateLicenseRequest,
    },
    services::{AssignmentService, LicensingError},
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_licenses).post(create_license))
        .route(
            "/{id}",
            get(get_license).put(update_license).delete(delete_license),
        )
        .route("/{id}/availability", get(get_availability))
        .route("/{id}/activate", post(activate))
        .route("/{id}/deactivate", post(deactivate))
}

async fn list_licenses(State(state): State<AppState>) -> AppResult<Json<Vec<License>>> {
    let licenses = LicenseRepository::new(&state.db).list().await?;
    Ok(Json(licenses))
}

async fn get_license(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<License>> {
    let license = LicenseRepository::new(&state.db)
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("License not found"))?;
    Ok(Json(license))
}

/// Seat availability for a license
///
/// GET /api/v1/licenses/{id}/availability
async fn get_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LicenseAvailability>> {
    let availability = AssignmentService::new(state.db.clone())
        .availability(id)
        .await?;
    Ok(Json(availability))
}

/// Self-service activation: take one seat on the license for the caller
///
/// POST /api/v1/licenses/{id}/activate
async fn activate(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ActivateRequest>>,
) -> AppResult<(StatusCode, Json<Assignment>)> {
    let notes = payload.and_then(|Json(p)| p.notes);
    let assignment = AssignmentService::new(state.db.clone())
        .activate(id, &auth_user.to_actor(), notes)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Self-service release of the caller's active seat on the license
///
/// POST /api/v1/licenses/{id}/deactivate
async fn deactivate(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Assignment>> {
    let service = AssignmentService::new(state.db.clone());
    let assignment = service
        .find_active_for_user(id, auth_user.id)
        .await?
        .ok_or_else(|| {
            AppError::from(LicensingError::NotFound(
                "Active assignment for this license".to_string(),
            ))
        })?;

    let released = service
        .deactivate(assignment.id, &auth_user.to_actor())
        .await?;
    Ok(Json(released))
}

async fn create_license(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateLicenseRequest>,
) -> AppResult<(StatusCode, Json<License>)> {
    require_admin(&auth_user)?;
    payload.validate()?;

    let license = LicenseRepository::new(&state.db).create(&payload).await?;

    log_security_best_effort(
        &state,
        SecurityAction::LicenseCreated,
        &license.name,
        &auth_user,
        Some(format!("{} seats", license.seat_count)),
    )
    .await;

    Ok((StatusCode::CREATED, Json(license)))
}

async fn update_license(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLicenseRequest>,
) -> AppResult<Json<License>> {
    require_admin(&auth_user)?;

    if let Some(seat_count) = payload.seat_count {
        if seat_count < 1 {
            return Err(AppError::ValidationError(
                "seat_count must be at least 1".to_string(),
            ));
        }
    }

    let repo = LicenseRepository::new(&state.db);
    if repo.find(id).await?.is_none() {
        return Err(AppError::not_found("License not found"));
    }

    let license = repo.update(id, &payload).await?;

    log_security_best_effort(
        &state,
        SecurityAction::LicenseUpdated,
        &license.name,
        &auth_user,
        None,
    )
    .await;

    Ok(Json(license))
}

async fn delete_license(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&auth_user)?;

    let repo = LicenseRepository::new(&state.db);
    let license = repo
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("License not found"))?;

    repo.delete(id).await?;

    log_security_best_effort(
        &state,
        SecurityAction::LicenseDeleted,
        &license.name,
        &auth_user,
        None,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
