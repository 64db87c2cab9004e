//! Device management API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::require_admin,
    db::DeviceRepository,
    middleware::AuthUser,
    models::{ApproveAssignmentRequest, Assignment, AssignmentTarget, CreateDeviceRequest, Device},
    services::AssignmentService,
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_devices).post(create_device))
        .route("/{id}", get(get_device).delete(delete_device))
        .route("/{id}/assignments", post(approve_assignment))
}

async fn list_devices(State(state): State<AppState>) -> AppResult<Json<Vec<Device>>> {
    let devices = DeviceRepository::new(&state.db).list().await?;
    Ok(Json(devices))
}

async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Device>> {
    let device = DeviceRepository::new(&state.db)
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("Device not found"))?;
    Ok(Json(device))
}

async fn create_device(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateDeviceRequest>,
) -> AppResult<(StatusCode, Json<Device>)> {
    require_admin(&auth_user)?;
    payload.validate()?;

    let device = DeviceRepository::new(&state.db).create(&payload).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

async fn delete_device(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&auth_user)?;

    let deleted = DeviceRepository::new(&state.db).delete(id).await?;
    if !deleted {
        return Err(AppError::not_found("Device not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Administrative pre-approval of a seat for a device
///
/// POST /api/v1/devices/{id}/assignments
async fn approve_assignment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApproveAssignmentRequest>,
) -> AppResult<(StatusCode, Json<Assignment>)> {
    if DeviceRepository::new(&state.db).find(id).await?.is_none() {
        return Err(AppError::not_found("Device not found"));
    }

    let assignment = AssignmentService::new(state.db.clone())
        .approve(
            payload.license_id,
            AssignmentTarget::Device(id),
            &auth_user.to_actor(),
            payload.notes,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}
