//! Bearer authentication and role gating.
//!
//! Every protected router is wrapped in [`require_role`] with the roles it
//! accepts:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/", get(list))
//!     .route_layer(from_fn_with_state(Guard::new(state, ADMIN_ONLY), require_role))
//! ```
//!
//! The guard verifies the token, reloads the user, applies
//! [`ventas_core::access::is_permitted`] to the stored role and leaves a
//! [`CurrentUser`] in the request extensions for handlers to extract.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::Span;

use ventas_core::UserRole;
use ventas_core::access::is_permitted;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::user::CurrentUser;
use crate::services::tokens::bearer_token;
use crate::state::AppState;

/// Middleware state: the app state plus the roles a route group accepts.
#[derive(Clone)]
pub struct Guard {
    state: AppState,
    roles: &'static [UserRole],
}

impl Guard {
    #[must_use]
    pub const fn new(state: AppState, roles: &'static [UserRole]) -> Self {
        Self { state, roles }
    }
}

/// Reject the request unless it carries a valid token for an active user
/// whose role is one of the guard's roles.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` for a missing or bad token or an unknown
/// or deactivated user, and `AppError::Forbidden` for a role mismatch.
pub async fn require_role(
    State(guard): State<Guard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    let claims = guard.state.tokens().verify(token)?;

    let user = UserRepository::new(guard.state.pool())
        .get_by_id(claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::Unauthorized("account not found or deactivated".to_string()))?;

    if !is_permitted(user.role, guard.roles) {
        tracing::debug!(user_id = %user.id, role = %user.role, "role not permitted");
        return Err(AppError::Forbidden(
            "your role does not allow this action".to_string(),
        ));
    }

    Span::current().record("user_id", tracing::field::display(user.id));
    set_sentry_user(&user.id, &user.username);

    request.extensions_mut().insert(CurrentUser::from(&user));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))
    }
}
