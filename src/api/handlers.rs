//! Route handlers.
//!
//! `/api/*` routes take JSON (or multipart for label uploads). `/v1/*` routes
//! take form fields and share the same logic with an `api` default source.

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Multipart, State};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ApiError;
use super::state::AppState;
use crate::db::{self, DashboardStats};
use crate::errors::{error_logging, AppError};
use crate::ocr::{scan_label, LabelFormat};
use crate::sentiment::Sentiment;
use crate::validation::{
    med_key, validate_source, validate_text_field, MAX_FEEDBACK_CHARS, MAX_FIELD_CHARS,
    MAX_MED_KEY_CHARS,
};

pub const DEFAULT_PLAN_SOURCE: &str = "manual";
pub const DEFAULT_FEEDBACK_SOURCE: &str = "web";
pub const DEFAULT_V1_SOURCE: &str = "api";

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub name: String,
    pub dose: String,
    pub frequency: String,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub med: String,
    pub advice: String,
    pub source: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub med: String,
    pub feedback: String,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub sentiment: Sentiment,
}

#[derive(Debug, Serialize)]
pub struct ParsedLabel {
    pub name: String,
    pub dose: String,
}

#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub parsed: ParsedLabel,
}

fn resolve_source(source: Option<String>, default: &str) -> Result<String, ApiError> {
    let source = source.unwrap_or_else(|| default.to_string());
    validate_source(&source)?;
    Ok(source)
}

fn db_error(err: anyhow::Error, operation: &str, med_key: Option<&str>) -> ApiError {
    error_logging::log_database_error(&format!("{err:#}"), operation, med_key);
    ApiError(AppError::Database(format!("{err:#}")))
}

/// `POST /api/ocr`: read a label photo and return the matched drug
pub async fn ocr_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        // Reject unknown types before buffering the upload
        LabelFormat::from_content_type(&content_type)?;

        let bytes = field.bytes().await?;
        info!(content_type = %content_type, size = bytes.len(), "Label upload received");

        let scan = scan_label(
            state.extractor.as_ref(),
            &state.matcher,
            bytes.to_vec(),
            &content_type,
        )
        .await?;

        return Ok(Json(OcrResponse {
            parsed: ParsedLabel {
                name: scan.name,
                dose: scan.dose,
            },
        }));
    }

    Err(AppError::Validation("multipart field 'file' is required".to_string()).into())
}

async fn generate_plan(
    state: &AppState,
    request: PlanRequest,
    default_source: &str,
) -> Result<PlanResponse, ApiError> {
    let name = validate_text_field("name", &request.name, MAX_FIELD_CHARS)?;
    let dose = validate_text_field("dose", &request.dose, MAX_FIELD_CHARS)?;
    let frequency = validate_text_field("frequency", &request.frequency, MAX_FIELD_CHARS)?;
    let source = resolve_source(request.source, default_source)?;

    let med = med_key(name, dose);
    let advice = state.advice.generate(name, dose, frequency).await?;

    db::save_plan(&state.pool, name, dose, frequency, &advice, &source)
        .await
        .map_err(|e| db_error(e, "save_plan", Some(&med)))?;

    info!(med = %med, source = %source, "Plan generated");
    Ok(PlanResponse {
        med,
        advice,
        source,
    })
}

async fn record_feedback(
    state: &AppState,
    request: FeedbackRequest,
    default_source: &str,
) -> Result<FeedbackResponse, ApiError> {
    let med = validate_text_field("med", &request.med, MAX_MED_KEY_CHARS)?.to_lowercase();
    let feedback = validate_text_field("feedback", &request.feedback, MAX_FEEDBACK_CHARS)?;
    let source = resolve_source(request.source, default_source)?;

    let sentiment = state.sentiment.classify(feedback).await?;

    db::save_feedback(&state.pool, &med, feedback, sentiment, &source)
        .await
        .map_err(|e| db_error(e, "save_feedback", Some(&med)))?;

    info!(med = %med, sentiment = %sentiment, source = %source, "Feedback recorded");
    Ok(FeedbackResponse { sentiment })
}

/// `POST /api/plan`
pub async fn create_plan(
    State(state): State<AppState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<PlanResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(generate_plan(&state, request, DEFAULT_PLAN_SOURCE).await?))
}

/// `POST /api/feedback`
pub async fn submit_feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(record_feedback(&state, request, DEFAULT_FEEDBACK_SOURCE).await?))
}

/// `POST /v1/medication/plan`
pub async fn v1_plan(
    State(state): State<AppState>,
    payload: Result<Form<PlanRequest>, FormRejection>,
) -> Result<Json<PlanResponse>, ApiError> {
    let Form(request) = payload?;
    Ok(Json(generate_plan(&state, request, DEFAULT_V1_SOURCE).await?))
}

/// `POST /v1/medication/feedback`
pub async fn v1_feedback(
    State(state): State<AppState>,
    payload: Result<Form<FeedbackRequest>, FormRejection>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let Form(request) = payload?;
    Ok(Json(record_feedback(&state, request, DEFAULT_V1_SOURCE).await?))
}

/// `GET /api/dashboard` and `GET /v1/dashboard`
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    let stats = db::get_dashboard_stats(&state.pool)
        .await
        .map_err(|e| db_error(e, "get_dashboard_stats", None))?;
    Ok(Json(stats))
}

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}
