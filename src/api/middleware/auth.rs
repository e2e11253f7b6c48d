//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it through the
//! configured `IdentityProvider`, and injects `CurrentUser` into request
//! extensions for downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{bearer_token, ApiContext, CurrentUser};

/// Require a valid bearer token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match authenticate(req, next, true).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

/// Resolve a bearer token when present. Anonymous requests pass through
/// without a `CurrentUser`; an invalid token is treated as anonymous too.
pub async fn optional_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match authenticate(req, next, false).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn authenticate(
    mut req: Request<axum::body::Body>,
    next: Next,
    required: bool,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(
        req.headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok()),
    )
    .map(str::to_string);

    let user = match &token {
        Some(token) => ctx.identity.lookup(token).await.map_err(ApiError::from)?,
        None => None,
    };

    match (user, token) {
        (Some(user), Some(token)) => {
            req.extensions_mut().insert(CurrentUser { user, token });
        }
        _ if required => return Err(ApiError::Unauthorized),
        _ => {}
    }

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    Ok(response)
}
