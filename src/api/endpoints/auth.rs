//! Account endpoints backed by the configured `IdentityProvider`.
//!
//! `POST /api/auth/signup`, `/login` and `/reset-password` are open.
//! `/logout`, `GET /me` and `PATCH /profile` need a bearer token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CurrentUser};
use crate::identity::{AuthSession, ProfileUpdate, User};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn require_email(email: &str) -> Result<&str, ApiError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required".into()));
    }
    Ok(email)
}

/// `POST /api/auth/signup`
pub async fn signup(
    State(ctx): State<ApiContext>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<AuthSession>), ApiError> {
    let email = require_email(&req.email)?;
    let session = ctx
        .identity
        .sign_up(email, &req.password, req.display_name.as_deref())
        .await?;
    tracing::info!(uid = %session.user.uid, "User signed up");
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /api/auth/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthSession>, ApiError> {
    let email = require_email(&req.email)?;
    let session = ctx.identity.sign_in(email, &req.password).await?;
    Ok(Json(session))
}

/// `POST /api/auth/logout`
pub async fn logout(
    State(ctx): State<ApiContext>,
    caller: CurrentUser,
) -> Result<StatusCode, ApiError> {
    ctx.identity.sign_out(&caller.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/auth/reset-password`: always answers the same way whether
/// or not the account exists.
pub async fn reset_password(
    State(ctx): State<ApiContext>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = require_email(&req.email)?;
    ctx.identity.send_password_reset(email).await?;
    Ok(Json(MessageResponse {
        message: "Password reset email sent",
    }))
}

/// `GET /api/auth/me`
pub async fn me(caller: CurrentUser) -> Json<User> {
    Json(caller.user)
}

/// `PATCH /api/auth/profile`
pub async fn update_profile(
    State(ctx): State<ApiContext>,
    caller: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    if update.display_name.is_none() && update.photo_url.is_none() {
        return Err(ApiError::BadRequest("Nothing to update".into()));
    }
    let user = ctx.identity.update_profile(&caller.token, update).await?;
    Ok(Json(user))
}
