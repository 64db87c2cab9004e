//! Authentication API endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::{
    db::UserRepository,
    middleware::auth::{create_access_token, AuthUser},
    models::{AuthResponse, ChangePasswordRequest, LoginRequest, UserPublic},
    services::AuthService,
    utils::{AppError, AppResult},
    AppState,
};

/// Create public routes for authentication endpoints (no auth required)
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Create protected routes for authentication endpoints (auth required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/change-password", post(change_password))
        .route("/me", get(get_current_user))
}

/// Login handler
///
/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let auth_service = AuthService::new(state.db.clone());

    let user = auth_service
        .authenticate(&payload.username, &payload.password)
        .await
        .map_err(|e| AppError::internal(format!("Authentication failed: {}", e)))?
        .ok_or_else(|| AppError::Unauthorized("Invalid username or password".to_string()))?;

    let roles = UserRepository::new(&state.db)
        .get_user_role_names(user.id)
        .await?;

    let access_token = create_access_token(
        &user.id,
        &user.username,
        &user.email,
        roles.clone(),
        &state.config.auth.jwt_secret,
        state.config.auth.token_expiry_hours,
    )
    .map_err(|e| AppError::internal(format!("Failed to create access token: {}", e)))?;

    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.auth.token_expiry_hours * 3600,
        user: UserPublic::from(user).with_roles(roles),
    }))
}

/// Change the authenticated user's password
///
/// POST /api/v1/auth/change-password
async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    payload.validate()?;

    if payload.new_password.len() < state.config.auth.password_min_length {
        return Err(AppError::ValidationError(format!(
            "Password must be at least {} characters",
            state.config.auth.password_min_length
        )));
    }

    let auth_service = AuthService::new(state.db.clone());
    let changed = auth_service
        .change_password(auth_user.id, &payload.current_password, &payload.new_password)
        .await?;

    if !changed {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({ "message": "Password changed" })))
}

/// Current authenticated user
///
/// GET /api/v1/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<UserPublic>> {
    let repo = UserRepository::new(&state.db);
    let user = repo
        .find(auth_user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let roles = repo.get_user_role_names(user.id).await?;

    Ok(Json(UserPublic::from(user).with_roles(roles)))
}
