//! User management API endpoints
//!
//! User CRUD, role management (guarded by admin protection) and the
//! administrative assignment operations addressed per user. The latter keep
//! the path consistency contract: the referenced assignment must belong to
//! the user in the path.

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
    db::UserRepository,
    middleware::AuthUser,
    models::{
        ApproveAssignmentRequest, Assignment, AssignmentTarget, CreateUserRequest, Role,
        SetRolesRequest, UpdateUserRequest, UserPublic,
    },
    services::{AdminGuard, AssignmentService, AuthService, LicensingError},
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/{id}/deactivate", post(deactivate_user))
        .route("/{id}/roles", get(get_user_roles).put(set_user_roles))
        .route("/{id}/roles/{role_id}", axum::routing::delete(remove_user_role))
        .route(
            "/{id}/assignments",
            get(list_user_assignments).post(approve_assignment),
        )
        .route(
            "/{id}/assignments/{assignment_id}/activate",
            post(activate_assignment),
        )
        .route(
            "/{id}/assignments/{assignment_id}/deactivate",
            post(deactivate_assignment),
        )
        .route(
            "/{id}/assignments/{assignment_id}",
            axum::routing::delete(cancel_assignment),
        )
}

async fn list_users(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<UserPublic>>> {
    require_admin(&auth_user)?;

    let repo = UserRepository::new(&state.db);
    let users = repo.list().await?;

    let mut result = Vec::with_capacity(users.len());
    for user in users {
        let roles = repo.get_user_role_names(user.id).await?;
        result.push(UserPublic::from(user).with_roles(roles));
    }

    Ok(Json(result))
}

async fn get_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserPublic>> {
    if !auth_user.is_admin() && auth_user.id != id {
        return Err(AppError::forbidden("Not allowed to view this user"));
    }

    let repo = UserRepository::new(&state.db);
    let user = repo
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let roles = repo.get_user_role_names(id).await?;

    Ok(Json(UserPublic::from(user).with_roles(roles)))
}

async fn create_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserPublic>)> {
    require_admin(&auth_user)?;
    payload.validate()?;

    if !crate::utils::validation::validate_username(&payload.username) {
        return Err(AppError::ValidationError(
            "Username must start with a letter and contain only letters, digits, dots, underscores or hyphens".to_string(),
        ));
    }

    let auth_service = AuthService::new(state.db.clone());
    let user = auth_service
        .create_user(
            &payload.username,
            &payload.email,
            &payload.password,
            &payload.role_ids,
            &auth_user.to_actor(),
        )
        .await
        .map_err(|e| {
            let message = e.to_string();
            if message.contains("already exists") {
                AppError::conflict(message)
            } else if message.contains("not found") {
                AppError::not_found(message)
            } else {
                AppError::internal(message)
            }
        })?;

    let roles = UserRepository::new(&state.db)
        .get_user_role_names(user.id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UserPublic::from(user).with_roles(roles)),
    ))
}

async fn update_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserPublic>> {
    if !auth_user.is_admin() && auth_user.id != id {
        return Err(AppError::forbidden("Not allowed to update this user"));
    }

    let auth_service = AuthService::new(state.db.clone());
    let user = auth_service
        .update_user(
            id,
            payload.username.as_deref(),
            payload.email.as_deref(),
            payload.password.as_deref(),
            &auth_user.to_actor(),
        )
        .await
        .map_err(|e| {
            let message = e.to_string();
            if message.contains("already exists") {
                AppError::conflict(message)
            } else if message.contains("not found") {
                AppError::not_found(message)
            } else {
                AppError::internal(message)
            }
        })?;

    let roles = UserRepository::new(&state.db)
        .get_user_role_names(user.id)
        .await?;

    Ok(Json(UserPublic::from(user).with_roles(roles)))
}

/// Delete a user; refused for the last administrator
async fn delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    AdminGuard::new(state.db.clone())
        .delete_user(id, &auth_user.to_actor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Deactivate a user account; refused for the last administrator
///
/// POST /api/v1/users/{id}/deactivate
async fn deactivate_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    AdminGuard::new(state.db.clone())
        .deactivate_user(id, &auth_user.to_actor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_user_roles(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Role>>> {
    if !auth_user.is_admin() && auth_user.id != id {
        return Err(AppError::forbidden("Not allowed to view this user's roles"));
    }

    let roles = UserRepository::new(&state.db).get_user_roles(id).await?;
    Ok(Json(roles))
}

/// Replace a user's full role set; refused when it would strip the last
/// administrator
///
/// PUT /api/v1/users/{id}/roles
async fn set_user_roles(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRolesRequest>,
) -> AppResult<Json<UserPublic>> {
    let user = AdminGuard::new(state.db.clone())
        .set_roles(id, &payload.role_ids, &auth_user.to_actor())
        .await?;
    Ok(Json(user))
}

/// Remove one role from a user; refused when it would strip the last
/// administrator
///
/// DELETE /api/v1/users/{id}/roles/{role_id}
async fn remove_user_role(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    AdminGuard::new(state.db.clone())
        .remove_role(id, role_id, &auth_user.to_actor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Administrative assignment operations
// =============================================================================

async fn list_user_assignments(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Assignment>>> {
    let assignments = AssignmentService::new(state.db.clone())
        .list_for_user(id, &auth_user.to_actor())
        .await?;
    Ok(Json(assignments))
}

/// Administrative pre-approval: create an inactive assignment for the user
///
/// POST /api/v1/users/{id}/assignments
async fn approve_assignment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApproveAssignmentRequest>,
) -> AppResult<(StatusCode, Json<Assignment>)> {
    let assignment = AssignmentService::new(state.db.clone())
        .approve(
            payload.license_id,
            AssignmentTarget::User(id),
            &auth_user.to_actor(),
            payload.notes,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// POST /api/v1/users/{id}/assignments/{assignment_id}/activate
async fn activate_assignment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, assignment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Assignment>> {
    let service = AssignmentService::new(state.db.clone());
    require_assignment_for_user(&service, assignment_id, id).await?;

    let assignment = service
        .admin_activate(assignment_id, &auth_user.to_actor())
        .await?;
    Ok(Json(assignment))
}

/// POST /api/v1/users/{id}/assignments/{assignment_id}/deactivate
async fn deactivate_assignment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, assignment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Assignment>> {
    let service = AssignmentService::new(state.db.clone());
    require_assignment_for_user(&service, assignment_id, id).await?;

    let assignment = service
        .deactivate(assignment_id, &auth_user.to_actor())
        .await?;
    Ok(Json(assignment))
}

/// Administrative cancellation of an inactive assignment
///
/// DELETE /api/v1/users/{id}/assignments/{assignment_id}
async fn cancel_assignment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, assignment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let service = AssignmentService::new(state.db.clone());
    require_assignment_for_user(&service, assignment_id, id).await?;

    service.cancel(assignment_id, &auth_user.to_actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The assignment referenced in the path must belong to the user in the
/// path.
async fn require_assignment_for_user(
    service: &AssignmentService,
    assignment_id: Uuid,
    user_id: Uuid,
) -> AppResult<()> {
    let assignment = service
        .find(assignment_id)
        .await?
        .ok_or_else(|| AppError::from(LicensingError::NotFound("Assignment".to_string())))?;

    if !assignment.belongs_to_user(user_id) {
        return Err(AppError::not_found(
            "Assignment does not belong to this user",
        ));
    }

    Ok(())
}
