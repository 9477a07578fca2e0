//! HTTP routes.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                              - Liveness
//! GET    /health/ready                        - Readiness (database)
//! GET    /uploads/{file}                      - Stored images
//!
//! # API, nested under /ventas/v1
//! POST   /auth/register                       - public
//! POST   /auth/login                          - public
//!
//! GET    /user                                - ADMIN
//! GET    /user/{id}                           - ADMIN
//! POST   /user/addUser                        - ADMIN
//! PUT    /user/update                         - ADMIN|CLIENT (self)
//! DELETE /user/delete                         - ADMIN|CLIENT (self)
//! PATCH  /user/updatePhoto                    - ADMIN|CLIENT (self)
//! PUT    /user/updateUser/{id}                - ADMIN
//! PATCH  /user/updateRole/{id}                - ADMIN
//! DELETE /user/deleteUser/{id}                - ADMIN
//! PATCH  /user/updatePhoto/{id}               - ADMIN
//!
//! GET    /category                            - ADMIN|CLIENT
//! GET    /category/getCategoryById/{id}       - ADMIN|CLIENT
//! POST   /category/addCategory                - ADMIN
//! PUT    /category/updateCategory/{id}        - ADMIN
//! DELETE /category/deleteCategory/{id}        - ADMIN
//! PATCH  /category/activateCategory/{id}      - ADMIN
//!
//! GET    /product                             - ADMIN|CLIENT
//! GET    /product/search?query=               - ADMIN|CLIENT
//! GET    /product/top-selling                 - ADMIN|CLIENT
//! GET    /product/search/{id}                 - ADMIN|CLIENT
//! POST   /product/addProduct                  - ADMIN (multipart)
//! PUT    /product/updateProduct/{id}          - ADMIN (multipart)
//! PATCH  /product/deleteProduct/{id}          - ADMIN
//!
//! POST   /cart/createCart                     - ADMIN|CLIENT
//! GET    /cart                                - ADMIN|CLIENT
//! POST   /cart/add                            - ADMIN|CLIENT
//! PUT    /cart/update                         - ADMIN|CLIENT
//! DELETE /cart/remove/{productId}             - ADMIN|CLIENT
//! DELETE /cart/clear                          - ADMIN|CLIENT
//!
//! POST   /invoice/create                      - ADMIN
//! GET    /invoice                             - ADMIN
//! GET    /invoice/user                        - ADMIN|CLIENT
//! PUT    /invoice/update                      - ADMIN
//! DELETE /invoice/delete/{invoiceId}          - ADMIN
//!
//! POST   /payment/create                      - ADMIN|CLIENT (PDF receipt)
//! ```

pub mod auth;
pub mod carts;
pub mod categories;
pub mod invoices;
pub mod payments;
pub mod products;
pub mod users;

use std::time::Duration;

use axum::extract::{DefaultBodyLimit, FromRequest, FromRequestParts, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Router, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use ventas_core::UserRole;

use crate::error::AppError;
use crate::middleware::{Guard, request_id_middleware, require_role};
use crate::state::AppState;

/// Prefix for every API route.
pub const API_PREFIX: &str = "/ventas/v1";

/// Multipart framing allowance on top of the upload size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// JSON body extractor whose rejection is an [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejection is an [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query extractor whose rejection is an [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Wrap every route registered so far in `router` with the role guard.
fn guarded(
    router: Router<AppState>,
    state: &AppState,
    roles: &'static [UserRole],
) -> Router<AppState> {
    router.route_layer(from_fn_with_state(Guard::new(state.clone(), roles), require_role))
}

/// All API routes, before nesting under [`API_PREFIX`].
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/user", users::routes(state))
        .nest("/category", categories::routes(state))
        .nest("/product", products::routes(state))
        .nest("/cart", carts::routes(state))
        .nest("/invoice", invoices::routes(state))
        .nest("/payment", payments::routes(state))
}

/// The complete application: API, health checks, uploads and the
/// cross-cutting layers.
pub fn app(state: AppState) -> Router {
    let body_limit = state.uploads().max_bytes() + MULTIPART_OVERHEAD_BYTES;
    let uploads = ServeDir::new(state.uploads().dir());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest(API_PREFIX, api_routes(&state))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
