//! `POST /api/analyze`: raw completion endpoint.
//!
//! Takes `{prompts: [..]}` and answers `{analysisSummary, recommendations}`.
//! Any failure, including a malformed body, is a 500 with the flat body
//! `{error: "AI analysis failed"}` rather than the structured API error.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::error::{ApiError, ANALYSIS_FAILED_MESSAGE};
use crate::api::types::ApiContext;

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub prompts: Vec<String>,
}

fn failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": ANALYSIS_FAILED_MESSAGE })),
    )
        .into_response()
}

pub async fn analyze(
    State(ctx): State<ApiContext>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let Some(orchestrator) = ctx.analysis.clone() else {
        return ApiError::AiUnavailable.into_response();
    };
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Analyze request body rejected");
            return failed();
        }
    };

    match orchestrator.run_batch(request.prompts).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Analysis batch failed");
            failed()
        }
    }
}
