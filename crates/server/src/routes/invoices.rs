//! Invoice routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::instrument;

use ventas_core::access::{ADMIN_ONLY, ANY_ROLE};
use ventas_core::checkout::CheckoutItem;
use ventas_core::{InvoiceId, InvoiceStatus, ProductId, UserId};

use super::{ApiJson, ApiPath, guarded};
use crate::db::InvoiceRepository;
use crate::error::Result;
use crate::models::invoice::InvoiceView;
use crate::models::user::CurrentUser;
use crate::services::CheckoutService;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let own = Router::new().route("/user", get(list_mine));
    let admin = Router::new()
        .route("/", get(list_all))
        .route("/create", post(create))
        .route("/update", put(update_status))
        .route("/delete/{invoice_id}", delete(cancel));

    guarded(own, state, ANY_ROLE).merge(guarded(admin, state, ADMIN_ONLY))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub user_id: UserId,
    pub products: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InvoiceItemRequest {
    pub product: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub invoice_id: InvoiceId,
    pub status: String,
}

/// Manual invoice for any user, created `PENDING`.
#[instrument(skip(state, request), fields(user_id = %request.user_id))]
async fn create(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceView>)> {
    let items: Vec<CheckoutItem> = request
        .products
        .iter()
        .map(|item| CheckoutItem {
            product_id: item.product,
            quantity: item.quantity,
        })
        .collect();

    let invoice = CheckoutService::new(state.pool())
        .create_invoice(request.user_id, &items)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<InvoiceView>>> {
    Ok(Json(InvoiceRepository::new(state.pool()).list_all().await?))
}

async fn list_mine(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<InvoiceView>>> {
    Ok(Json(
        InvoiceRepository::new(state.pool())
            .list_for_user(user.id)
            .await?,
    ))
}

/// Status change following the invoice state machine. Unknown status
/// strings are rejected before the invoice is loaded.
#[instrument(skip(state, request), fields(invoice_id = %request.invoice_id))]
async fn update_status(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<Json<InvoiceView>> {
    let status: InvoiceStatus = request.status.trim().parse()?;
    Ok(Json(
        CheckoutService::new(state.pool())
            .update_status(request.invoice_id, status)
            .await?,
    ))
}

#[instrument(skip(state))]
async fn cancel(
    State(state): State<AppState>,
    ApiPath(invoice_id): ApiPath<InvoiceId>,
) -> Result<Json<InvoiceView>> {
    Ok(Json(
        CheckoutService::new(state.pool())
            .cancel_invoice(invoice_id)
            .await?,
    ))
}
