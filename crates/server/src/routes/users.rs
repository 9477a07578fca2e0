//! User administration and self-service profile routes.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::instrument;

use ventas_core::access::{ADMIN_ONLY, ANY_ROLE};
use ventas_core::{UserId, UserRole};

use super::auth::{PROFILE_PICTURE_FIELD, create_account};
use super::{ApiJson, ApiPath, guarded};
use crate::db::{RepositoryError, UserRepository};
use crate::error::{AppError, Result};
use crate::models::user::{CurrentUser, User};
use crate::services::UploadError;
use crate::services::auth::{ProfileUpdate, profile_changes};
use crate::services::uploads::MultipartForm;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let own = Router::new()
        .route("/update", put(update_me))
        .route("/delete", delete(deactivate_me))
        .route("/updatePhoto", patch(update_my_photo));
    let admin = Router::new()
        .route("/", get(list))
        .route("/{id}", get(show))
        .route("/addUser", post(add_user))
        .route("/updateUser/{id}", put(update_user))
        .route("/updateRole/{id}", patch(update_role))
        .route("/deleteUser/{id}", delete(deactivate_user))
        .route("/updatePhoto/{id}", patch(update_photo));

    guarded(own, state, ANY_ROLE).merge(guarded(admin, state, ADMIN_ONLY))
}

/// Profile changes. A `role` key is accepted by the parser only so it can be
/// refused explicitly.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

fn not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("user not found".to_string()),
        other => other.into(),
    }
}

async fn apply_profile(state: &AppState, id: UserId, request: UpdateProfileRequest) -> Result<User> {
    if request.role.is_some() {
        return Err(AppError::DomainRule(
            "the role cannot be changed through this endpoint".to_string(),
        ));
    }
    let changes = profile_changes(ProfileUpdate {
        name: request.name,
        username: request.username,
        email: request.email,
        password: request.password,
    })?;
    if changes.is_empty() {
        return Err(AppError::Validation("no fields to update".to_string()));
    }

    let user = UserRepository::new(state.pool())
        .update(id, &changes)
        .await
        .map_err(not_found)?;
    tracing::info!(user_id = %id, "profile updated");
    Ok(user)
}

async fn replace_photo(
    state: &AppState,
    id: UserId,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<User> {
    let uploads = state.uploads();
    let form = MultipartForm::read(multipart?, PROFILE_PICTURE_FIELD, uploads.max_bytes()).await?;
    let file = form
        .file
        .as_ref()
        .ok_or(UploadError::MissingFile(PROFILE_PICTURE_FIELD))?;

    let users = UserRepository::new(state.pool());
    let previous = users
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?
        .profile_picture;

    let stored = uploads.save(file).await?;
    let user = match users.set_profile_picture(id, &stored).await {
        Ok(user) => user,
        Err(e) => {
            uploads.remove(&stored).await;
            return Err(not_found(e));
        }
    };
    if let Some(previous) = previous {
        uploads.remove(&previous).await;
    }
    Ok(user)
}

// =============================================================================
// Self-service
// =============================================================================

#[instrument(skip(state, user, request), fields(user_id = %user.id))]
async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<User>> {
    Ok(Json(apply_profile(&state, user.id, request).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn deactivate_me(State(state): State<AppState>, user: CurrentUser) -> Result<Json<User>> {
    let user = UserRepository::new(state.pool())
        .set_active(user.id, false)
        .await
        .map_err(not_found)?;
    tracing::info!(user_id = %user.id, "account deactivated by owner");
    Ok(Json(user))
}

#[instrument(skip(state, user, multipart), fields(user_id = %user.id))]
async fn update_my_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<User>> {
    Ok(Json(replace_photo(&state, user.id, multipart).await?))
}

// =============================================================================
// Administration
// =============================================================================

async fn list(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    Ok(Json(UserRepository::new(state.pool()).list().await?))
}

async fn show(State(state): State<AppState>, ApiPath(id): ApiPath<UserId>) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))
}

/// Create an ADMIN account.
#[instrument(skip(state, multipart))]
async fn add_user(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<User>)> {
    let user = create_account(&state, multipart?, UserRole::Admin).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, request))]
async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<User>> {
    Ok(Json(apply_profile(&state, id, request).await?))
}

#[instrument(skip(state, request))]
async fn update_role(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(request): ApiJson<UpdateRoleRequest>,
) -> Result<Json<User>> {
    let role: UserRole = request.role.trim().parse()?;
    let user = UserRepository::new(state.pool())
        .set_role(id, role)
        .await
        .map_err(not_found)?;
    tracing::info!(user_id = %id, role = %role, "role changed");
    Ok(Json(user))
}

#[instrument(skip(state))]
async fn deactivate_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<UserId>,
) -> Result<Json<User>> {
    let user = UserRepository::new(state.pool())
        .set_active(id, false)
        .await
        .map_err(not_found)?;
    tracing::info!(user_id = %id, "account deactivated");
    Ok(Json(user))
}

#[instrument(skip(state, multipart))]
async fn update_photo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<UserId>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<User>> {
    Ok(Json(replace_photo(&state, id, multipart).await?))
}
