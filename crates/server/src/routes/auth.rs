//! Registration and login.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use ventas_core::{Email, UserId, UserRole};

use super::ApiJson;
use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::services::auth::{AuthService, Registration};
use crate::services::uploads::MultipartForm;
use crate::state::AppState;

/// Multipart field carrying an avatar.
pub const PROFILE_PICTURE_FIELD: &str = "profilePicture";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: Email,
    pub role: UserRole,
    pub profile_picture: Option<String>,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            role: user.role,
            profile_picture: user.profile_picture,
        }
    }
}

/// Read a multipart account form, store any avatar, and create the account
/// with `role`. Shared by self-registration and admin user creation.
pub(crate) async fn create_account(
    state: &AppState,
    multipart: Multipart,
    role: UserRole,
) -> Result<User> {
    let uploads = state.uploads();
    let form = MultipartForm::read(multipart, PROFILE_PICTURE_FIELD, uploads.max_bytes()).await?;
    if form.fields.contains_key("role") {
        return Err(AppError::DomainRule(
            "the role of an account cannot be chosen here".to_string(),
        ));
    }

    let field = |name: &'static str| {
        form.text(name)
            .map(str::to_owned)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    };
    let mut registration = Registration {
        name: field("name")?,
        username: field("username")?,
        email: field("email")?,
        password: field("password")?,
        profile_picture: None,
    };

    if let Some(file) = &form.file {
        registration.profile_picture = Some(uploads.save(file).await?);
    }
    let stored = registration.profile_picture.clone();

    match AuthService::new(state.pool()).register(registration, role).await {
        Ok(user) => Ok(user),
        Err(e) => {
            if let Some(stored) = stored {
                uploads.remove(&stored).await;
            }
            Err(e.into())
        }
    }
}

/// Create a CLIENT account.
#[instrument(skip(state, multipart))]
async fn register(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<SessionUser>)> {
    let user = create_account(&state, multipart?, UserRole::Client).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Exchange a login and password for a bearer token.
#[instrument(skip(state, request))]
async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let login = request
        .email
        .as_deref()
        .or(request.username.as_deref())
        .map(str::trim)
        .filter(|login| !login.is_empty())
        .ok_or_else(|| AppError::Validation("email or username is required".to_string()))?;

    let user = AuthService::new(state.pool())
        .login(login, &request.password)
        .await?;
    let token = state.tokens().issue(user.id, user.role)?;

    tracing::info!(user_id = %user.id, "login succeeded");
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: state.tokens().ttl_seconds(),
        user: user.into(),
    }))
}
