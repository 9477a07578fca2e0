//! Cart routes. Every route acts on the caller's own cart.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::instrument;

use ventas_core::ProductId;
use ventas_core::access::ANY_ROLE;

use super::{ApiJson, ApiPath, guarded};
use crate::error::Result;
use crate::models::cart::CartView;
use crate::models::user::CurrentUser;
use crate::services::CartService;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/", get(show))
        .route("/createCart", post(create))
        .route("/add", post(add))
        .route("/update", put(set_quantity))
        .route("/remove/{product_id}", delete(remove))
        .route("/clear", delete(clear));

    guarded(router, state, ANY_ROLE)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<(StatusCode, Json<CartView>)> {
    let cart = CartService::new(state.pool()).create(user.id).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

async fn show(State(state): State<AppState>, user: CurrentUser) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.pool()).get(user.id).await?))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id))]
async fn add(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<LineRequest>,
) -> Result<Json<CartView>> {
    Ok(Json(
        CartService::new(state.pool())
            .add(user.id, request.product_id, request.quantity)
            .await?,
    ))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id))]
async fn set_quantity(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<LineRequest>,
) -> Result<Json<CartView>> {
    Ok(Json(
        CartService::new(state.pool())
            .set_quantity(user.id, request.product_id, request.quantity)
            .await?,
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<CartView>> {
    Ok(Json(
        CartService::new(state.pool())
            .remove(user.id, product_id)
            .await?,
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn clear(State(state): State<AppState>, user: CurrentUser) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.pool()).clear(user.id).await?))
}
