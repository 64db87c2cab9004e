//! Role listing API endpoints

use axum::{extract::State, routing::get, Json, Router};

use crate::{
    db::UserRepository,
    middleware::AuthUser,
    models::Role,
    utils::AppResult,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_roles))
}

async fn list_roles(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> AppResult<Json<Vec<Role>>> {
    let roles = UserRepository::new(&state.db).list_roles().await?;
    Ok(Json(roles))
}
