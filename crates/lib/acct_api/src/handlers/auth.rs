//! Authentication request handlers.

use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    LoginRequest, LogoutResponse, RefreshRequest, TokenResponse, ValidateRequest,
    ValidateResponse,
};

/// `POST /auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state.sessions.login(&body.email, &body.password).await?;
    Ok(Json(TokenResponse::bearer(
        pair,
        state.config.access_token_ttl_secs(),
    )))
}

/// `POST /auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state.sessions.refresh(&body.refresh_token).await?;
    Ok(Json(TokenResponse::bearer(
        pair,
        state.config.access_token_ttl_secs(),
    )))
}

/// `POST /auth/logout`: end the caller's session. Requires authentication.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> AppResult<Json<LogoutResponse>> {
    state.sessions.logout(user_id).await?;
    Ok(Json(LogoutResponse { success: true }))
}

/// `POST /auth/validate`: resolve an access token to its user ID.
pub async fn validate_handler(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> AppResult<Json<ValidateResponse>> {
    let user_id = state.sessions.validate_token(&body.access_token)?;
    Ok(Json(ValidateResponse { user_id }))
}
