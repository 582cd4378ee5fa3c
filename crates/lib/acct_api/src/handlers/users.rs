//! Account request handlers.
//!
//! Everything except registration requires a bearer token; mutations are
//! only allowed on the caller's own account.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{ChangePasswordRequest, RegisterRequest, UpdateProfileRequest, UserResponse};

fn ensure_self(caller: Uuid, target: Uuid) -> AppResult<()> {
    if caller != target {
        return Err(AppError::Forbidden(
            "Cannot modify another user's account".into(),
        ));
    }
    Ok(())
}

/// `POST /users`: create a new account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = state
        .users
        .register(&body.email, &body.password, body.name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `GET /users/me`: the caller's own account.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> AppResult<Json<UserResponse>> {
    let user = state.users.get(user_id).await?;
    Ok(Json(user.into()))
}

/// `GET /users/{id}`: look up an account.
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = state.users.get(id).await?;
    Ok(Json(user.into()))
}

/// `PATCH /users/{id}`: update email and/or name.
pub async fn update_user_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    ensure_self(caller, id)?;
    let user = state.users.update_profile(id, body.into()).await?;
    Ok(Json(user.into()))
}

/// `PUT /users/{id}/password`: change password; ends the current session.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    ensure_self(caller, id)?;
    state
        .users
        .change_password(id, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /users/{id}`: delete the account and its session.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ensure_self(caller, id)?;
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
