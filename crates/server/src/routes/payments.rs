//! Self-service payment of the caller's cart.

use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::{Router, routing::post};
use tracing::instrument;

use ventas_core::access::ANY_ROLE;

use super::guarded;
use crate::error::Result;
use crate::models::user::CurrentUser;
use crate::services::{CheckoutService, receipt};
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    guarded(Router::new().route("/create", post(pay)), state, ANY_ROLE)
}

/// Pay for the cart and stream back the PDF receipt.
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn pay(State(state): State<AppState>, user: CurrentUser) -> Result<impl IntoResponse> {
    let invoice = CheckoutService::new(state.pool()).pay_cart(user.id).await?;
    let pdf = receipt::render(&invoice)?;

    let disposition = format!("attachment; filename=\"invoice-{}.pdf\"", invoice.id);
    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    ))
}
