//! Report endpoints: dashboard list, upload, detail, and the owner-only
//! mutations (delete, visibility, share link, analysis).

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CurrentUser};
use crate::models::{NewReport, RangeStatus, Report, ReportAnalysis, ReportContent, ReportPatch, TestResult};
use crate::range::{classify, classify_detailed, RangeBasis};

pub const REPORT_UNAVAILABLE: &str = "Report not found or you do not have permission to view it";
pub const TITLE_REQUIRED: &str = "Please provide a title for the report";
pub const RESULTS_REQUIRED: &str = "Please add at least one test result with name and value";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: String,
    pub title: String,
    pub upload_date: DateTime<Utc>,
    pub is_public: bool,
    pub result_count: usize,
    pub abnormal_count: usize,
    pub has_analysis: bool,
}

impl From<&Report> for ReportSummary {
    fn from(report: &Report) -> Self {
        let results = &report.content.test_results;
        Self {
            id: report.id.clone(),
            title: report.title.clone(),
            upload_date: report.upload_date,
            is_public: report.is_public,
            result_count: results.len(),
            abnormal_count: results
                .iter()
                .filter(|r| classify(&r.value, r.reference_range.as_deref()).is_abnormal())
                .count(),
            has_analysis: report.analysis.is_some(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedReport {
    pub id: String,
}

/// A test result with its computed range status. `basis` tells an
/// in-range `Normal` apart from one that could not be classified.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedResult {
    #[serde(flatten)]
    pub result: TestResult,
    pub status: RangeStatus,
    pub basis: RangeBasis,
}

impl From<TestResult> for ClassifiedResult {
    fn from(result: TestResult) -> Self {
        let classification = classify_detailed(&result.value, result.reference_range.as_deref());
        Self {
            result,
            status: classification.status,
            basis: classification.basis,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    pub id: String,
    pub title: String,
    pub upload_date: DateTime<Utc>,
    pub is_public: bool,
    pub test_results: Vec<ClassifiedResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_info: Option<crate::models::PatientInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lab_info: Option<crate::models::LabInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ReportAnalysis>,
    pub is_owner: bool,
}

impl ReportDetail {
    fn new(report: Report, is_owner: bool) -> Self {
        let ReportContent {
            test_results,
            patient_info,
            doctor_notes,
            lab_info,
        } = report.content;
        Self {
            id: report.id,
            title: report.title,
            upload_date: report.upload_date,
            is_public: report.is_public,
            test_results: test_results.into_iter().map(ClassifiedResult::from).collect(),
            patient_info,
            doctor_notes,
            lab_info,
            analysis: report.analysis,
            is_owner,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub is_public: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityResponse {
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_link: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkResponse {
    pub share_link: String,
}

/// `None` for an empty body (toggle), otherwise the requested value.
fn parse_visibility(body: &[u8]) -> Result<Option<bool>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<VisibilityRequest>(body)
        .map(|req| Some(req.is_public))
        .map_err(|e| ApiError::BadRequest(format!("Invalid visibility body: {e}")))
}

/// Load a report the caller owns. Missing and foreign reports look the same.
fn owned_report(ctx: &ApiContext, caller: &CurrentUser, id: &str) -> Result<Report, ApiError> {
    ctx.store
        .get(id)?
        .filter(|r| r.user_id == caller.uid())
        .ok_or_else(|| ApiError::NotFound(REPORT_UNAVAILABLE.into()))
}

/// `GET /api/reports`: the caller's reports in upload order.
pub async fn list(
    State(ctx): State<ApiContext>,
    caller: CurrentUser,
) -> Result<Json<Vec<ReportSummary>>, ApiError> {
    let reports = ctx.store.list_for_user(caller.uid())?;
    Ok(Json(reports.iter().map(ReportSummary::from).collect()))
}

/// `POST /api/reports`: upload a report. Blank rows are dropped before
/// the at-least-one-result check.
pub async fn create(
    State(ctx): State<ApiContext>,
    caller: CurrentUser,
    Json(mut report): Json<NewReport>,
) -> Result<(StatusCode, Json<CreatedReport>), ApiError> {
    let title = report.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest(TITLE_REQUIRED.into()));
    }
    report.title = title.to_string();

    report.content.test_results.retain(TestResult::is_filled_in);
    if report.content.test_results.is_empty() {
        return Err(ApiError::BadRequest(RESULTS_REQUIRED.into()));
    }

    let results = report.content.test_results.len();
    let id = ctx.store.create(caller.uid(), report)?;
    tracing::info!(report_id = %id, results, "Report uploaded");
    Ok((StatusCode::CREATED, Json(CreatedReport { id })))
}

/// `GET /api/reports/:id`: owner view first, then the public path.
pub async fn detail(
    State(ctx): State<ApiContext>,
    caller: Option<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ReportDetail>, ApiError> {
    if let Some(caller) = &caller {
        if let Some(report) = ctx.store.get(&id)?.filter(|r| r.user_id == caller.uid()) {
            return Ok(Json(ReportDetail::new(report, true)));
        }
    }

    ctx.store
        .get_public(&id)?
        .map(|report| Json(ReportDetail::new(report, false)))
        .ok_or_else(|| ApiError::NotFound(REPORT_UNAVAILABLE.into()))
}

/// `DELETE /api/reports/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let report = owned_report(&ctx, &caller, &id)?;
    ctx.store.delete(&report.id)?;
    tracing::info!(report_id = %id, "Report deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/reports/:id/visibility`: set `isPublic`, or flip it when
/// the body is empty.
///
/// The body is parsed as JSON regardless of `Content-Type`. A body that is
/// present but not a valid `{"isPublic": bool}` is a 400 and changes nothing.
pub async fn visibility(
    State(ctx): State<ApiContext>,
    caller: CurrentUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<VisibilityResponse>, ApiError> {
    let requested = parse_visibility(&body)?;
    let report = owned_report(&ctx, &caller, &id)?;
    let is_public = requested.unwrap_or(!report.is_public);

    ctx.store.update(&id, ReportPatch::visibility(is_public))?;
    tracing::info!(report_id = %id, is_public, "Report visibility changed");

    Ok(Json(VisibilityResponse {
        is_public,
        share_link: is_public.then(|| ctx.share_link(&id)),
    }))
}

/// `GET /api/reports/:id/share-link`
pub async fn share_link(
    State(ctx): State<ApiContext>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ShareLinkResponse>, ApiError> {
    let report = owned_report(&ctx, &caller, &id)?;
    if !report.is_public {
        return Err(ApiError::BadRequest(
            "Report is private. Make it public before sharing".into(),
        ));
    }
    Ok(Json(ShareLinkResponse {
        share_link: ctx.share_link(&id),
    }))
}

/// `POST /api/reports/:id/analyze`: run the orchestrator over the
/// report's current results and return the stored analysis.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ReportAnalysis>, ApiError> {
    let orchestrator = ctx.analysis.clone().ok_or(ApiError::AiUnavailable)?;
    let report = owned_report(&ctx, &caller, &id)?;
    let analysis = orchestrator
        .analyze_report(ctx.store.as_ref(), &report.id)
        .await?;
    Ok(Json(analysis))
}
