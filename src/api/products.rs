//! Product management API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{log_security_best_effort, require_admin},
    db::ProductRepository,
    middleware::AuthUser,
    models::{CreateProductRequest, Product, SecurityAction, UpdateProductRequest},
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    let products = ProductRepository::new(&state.db).list().await?;
    Ok(Json(products))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let product = ProductRepository::new(&state.db)
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;
    Ok(Json(product))
}

async fn create_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<Product>)> {
    require_admin(&auth_user)?;
    payload.validate()?;

    if !crate::utils::validation::validate_display_name(&payload.name) {
        return Err(AppError::ValidationError(
            "Product name must be non-blank and at most 200 characters".to_string(),
        ));
    }

    let product = ProductRepository::new(&state.db).create(&payload).await?;

    log_security_best_effort(
        &state,
        SecurityAction::ProductCreated,
        &product.name,
        &auth_user,
        None,
    )
    .await;

    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<Product>> {
    require_admin(&auth_user)?;

    let repo = ProductRepository::new(&state.db);
    if repo.find(id).await?.is_none() {
        return Err(AppError::not_found("Product not found"));
    }

    let product = repo.update(id, &payload).await?;

    log_security_best_effort(
        &state,
        SecurityAction::ProductUpdated,
        &product.name,
        &auth_user,
        None,
    )
    .await;

    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&auth_user)?;

    let repo = ProductRepository::new(&state.db);
    let product = repo
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    repo.delete(id).await?;

    log_security_best_effort(
        &state,
        SecurityAction::ProductDeleted,
        &product.name,
        &auth_user,
        None,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

