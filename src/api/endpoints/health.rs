//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub app: &'static str,
    pub version: &'static str,
    pub identity_provider: String,
    /// Completion backend name, `None` when analysis is disabled.
    pub analysis_backend: Option<String>,
}

/// `GET /api/health`: liveness plus which adapters are wired in.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        app: crate::config::APP_NAME,
        version: crate::config::APP_VERSION,
        identity_provider: ctx.identity.name().to_string(),
        analysis_backend: ctx.analysis.as_ref().map(|a| a.client_name().to_string()),
    })
}
