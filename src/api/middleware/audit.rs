//! Access logging middleware.
//!
//! Logs every API request with method, path, caller uid and response
//! status. Runs inside the auth layer so `CurrentUser` is visible.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::CurrentUser;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let uid = req
        .extensions()
        .get::<CurrentUser>()
        .map(|c| c.uid().to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        %uid,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "API access"
    );
    response
}
