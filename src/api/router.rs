//! HTTP router.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS (any origin) → 2. Request metrics and logging → 3. Body size limit

use axum::extract::{DefaultBodyLimit, MatchedPath, Request};
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::Instrument;

use super::handlers;
use super::state::AppState;
use crate::observability::{metrics, request_span};

/// Build the API router
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ocr", post(handlers::ocr_upload))
        .route("/api/plan", post(handlers::create_plan))
        .route("/api/feedback", post(handlers::submit_feedback))
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/v1/medication/plan", post(handlers::v1_plan))
        .route("/v1/medication/feedback", post(handlers::v1_feedback))
        .route("/v1/dashboard", get(handlers::dashboard))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(from_fn(track_requests))
        .layer(cors)
        .with_state(state)
}

/// Log and count every request under its route template
async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let span = request_span(&method, &route);
    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status().as_u16();
    metrics::record_request_metrics(&method, &route, status, duration);
    tracing::info!(
        method = %method,
        route = %route,
        status,
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}
