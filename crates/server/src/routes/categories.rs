//! Category routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::instrument;

use ventas_core::CategoryId;
use ventas_core::access::{ADMIN_ONLY, ANY_ROLE};
use ventas_core::catalog::CategoryFields;

use super::{ApiJson, ApiPath, guarded};
use crate::db::CategoryRepository;
use crate::error::Result;
use crate::models::category::Category;
use crate::services::CatalogService;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let readers = Router::new()
        .route("/", get(list))
        .route("/getCategoryById/{id}", get(show));
    let admin = Router::new()
        .route("/addCategory", post(add))
        .route("/updateCategory/{id}", put(update))
        .route("/deleteCategory/{id}", delete(deactivate))
        .route("/activateCategory/{id}", patch(activate));

    guarded(readers, state, ANY_ROLE).merge(guarded(admin, state, ADMIN_ONLY))
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: String,
}

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.pool(), state.config().default_category_id)
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list_active().await?))
}

async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<Json<Category>> {
    Ok(Json(catalog(&state).get_category(id).await?))
}

#[instrument(skip(state, request))]
async fn add(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let fields = CategoryFields::validated(&request.name, &request.description)?;
    let category = catalog(&state).add_category(&fields).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, request))]
async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(request): ApiJson<CategoryRequest>,
) -> Result<Json<Category>> {
    let fields = CategoryFields::validated(&request.name, &request.description)?;
    Ok(Json(catalog(&state).update_category(id, &fields).await?))
}

#[instrument(skip(state))]
async fn deactivate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<Json<Category>> {
    Ok(Json(catalog(&state).deactivate_category(id).await?))
}

#[instrument(skip(state))]
async fn activate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<Json<Category>> {
    Ok(Json(catalog(&state).activate_category(id).await?))
}
