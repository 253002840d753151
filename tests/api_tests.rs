//! # HTTP API Tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`, using an
//! in-memory database and stand-in OCR and model collaborators.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use medication_victory_plan::api::build_router;
use medication_victory_plan::db;
use medication_victory_plan::sentiment::Sentiment;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

mod test_helpers;
use test_helpers::{setup_test_database, test_state, CannedExtractor, RecordingModel};

const MAX_UPLOAD_BYTES: usize = 1024 * 1024;
const BOUNDARY: &str = "mvp-test-boundary";

async fn app_with(
    extractor: CannedExtractor,
    model: Arc<RecordingModel>,
    sentiment: Sentiment,
) -> (Router, sqlx::SqlitePool) {
    let pool = setup_test_database().await.expect("test database");
    let state = test_state(pool.clone(), Arc::new(extractor), model, sentiment);
    (build_router(state, MAX_UPLOAD_BYTES), pool)
}

async fn default_app() -> (Router, sqlx::SqlitePool) {
    app_with(
        CannedExtractor::text("Take METFORMIN 500mg twice daily"),
        Arc::new(RecordingModel::replying("  Take with meals.  ")),
        Sentiment::Positive,
    )
    .await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_upload(field: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"label\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/api/ocr")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = default_app().await;
    let (status, body) = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_ocr_returns_matched_label() {
    let (app, _) = default_app().await;
    let (status, body) = send(app, multipart_upload("file", "image/png", b"\x89PNG fake")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"parsed": {"name": "Metformin", "dose": "500mg"}}));
}

#[tokio::test]
async fn test_ocr_without_match_returns_empty_fields() {
    let (app, _) = app_with(
        CannedExtractor::text("vitamin d3 chewable"),
        Arc::new(RecordingModel::replying("unused")),
        Sentiment::Neutral,
    )
    .await;
    let (status, body) = send(app, multipart_upload("file", "image/jpeg", b"jpeg bytes")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"parsed": {"name": "", "dose": ""}}));
}

#[tokio::test]
async fn test_ocr_rejects_unknown_content_type() {
    let (app, _) = default_app().await;
    let (status, body) = send(app, multipart_upload("file", "image/gif", b"GIF89a")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
    assert_eq!(body["error"]["message"], "Only PNG, JPG, PDF allowed");
}

#[tokio::test]
async fn test_ocr_requires_file_field() {
    let (app, _) = default_app().await;
    let (status, body) = send(app, multipart_upload("photo", "image/png", b"png")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
}

#[tokio::test]
async fn test_ocr_engine_failure_is_bad_gateway() {
    let (app, _) = app_with(
        CannedExtractor::failing(),
        Arc::new(RecordingModel::replying("unused")),
        Sentiment::Neutral,
    )
    .await;
    let (status, body) = send(app, multipart_upload("file", "image/png", b"png")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "OCR");
}

#[tokio::test]
async fn test_plan_generates_and_stores_advice() {
    let model = Arc::new(RecordingModel::replying("  Take with meals.  "));
    let (app, pool) = app_with(
        CannedExtractor::text(""),
        Arc::clone(&model),
        Sentiment::Neutral,
    )
    .await;

    let (status, body) = send(
        app,
        json_post(
            "/api/plan",
            json!({"name": "Warfarin", "dose": "5MG", "frequency": "once daily"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"med": "warfarin 5mg", "advice": "Take with meals.", "source": "manual"})
    );

    let prompts = model.prompts.lock();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Drug: Warfarin 5MG, once daily"));
    assert!(prompts[0].contains("Leafy greens"));
    drop(prompts);

    let plan = db::read_plan(&pool, 1).await.unwrap().expect("plan stored");
    assert_eq!(plan.drug_name, "warfarin");
    assert_eq!(plan.source, "manual");
}

#[tokio::test]
async fn test_plan_rejects_blank_fields_before_calling_model() {
    let model = Arc::new(RecordingModel::replying("unused"));
    let (app, _) = app_with(
        CannedExtractor::text(""),
        Arc::clone(&model),
        Sentiment::Neutral,
    )
    .await;

    let (status, body) = send(
        app,
        json_post(
            "/api/plan",
            json!({"name": "   ", "dose": "5mg", "frequency": "daily"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
    assert!(model.prompts.lock().is_empty());
}

#[tokio::test]
async fn test_plan_rejects_malformed_json() {
    let (app, _) = default_app().await;
    let request = Request::post("/api/plan")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
}

#[tokio::test]
async fn test_plan_rejects_invalid_source() {
    let (app, _) = default_app().await;
    let (status, _) = send(
        app,
        json_post(
            "/api/plan",
            json!({"name": "Metformin", "dose": "500mg", "frequency": "daily", "source": "Mobile App!"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_plan_model_failure_is_bad_gateway() {
    let (app, pool) = app_with(
        CannedExtractor::text(""),
        Arc::new(RecordingModel::failing("rate limited")),
        Sentiment::Neutral,
    )
    .await;

    let (status, body) = send(
        app,
        json_post(
            "/api/plan",
            json!({"name": "Metformin", "dose": "500mg", "frequency": "daily"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM");
    assert!(db::read_plan(&pool, 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_model_reply_is_bad_gateway() {
    let (app, _) = app_with(
        CannedExtractor::text(""),
        Arc::new(RecordingModel::replying("   ")),
        Sentiment::Neutral,
    )
    .await;

    let (status, _) = send(
        app,
        json_post(
            "/api/plan",
            json!({"name": "Metformin", "dose": "500mg", "frequency": "daily"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_v1_plan_accepts_form_and_defaults_source_to_api() {
    let (app, _) = default_app().await;
    let (status, body) = send(
        app,
        form_post("/v1/medication/plan", "name=Metformin&dose=500mg&frequency=twice+daily"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["med"], "metformin 500mg");
    assert_eq!(body["source"], "api");
}

#[tokio::test]
async fn test_v1_plan_missing_form_field_is_bad_request() {
    let (app, _) = default_app().await;
    let (status, _) = send(app, form_post("/v1/medication/plan", "name=Metformin")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feedback_flows_into_dashboard() {
    let (app, pool) = app_with(
        CannedExtractor::text(""),
        Arc::new(RecordingModel::replying("unused")),
        Sentiment::VeryPositive,
    )
    .await;

    let (status, body) = send(
        app.clone(),
        json_post(
            "/api/feedback",
            json!({"med": "Metformin 500MG", "feedback": "No side effects at all!"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"sentiment": "very_positive"}));

    let (status, _) = send(
        app.clone(),
        form_post(
            "/v1/medication/feedback",
            "med=metformin+500mg&feedback=Works+well&source=clinic",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let rows = db::list_feedback(&pool, "metformin 500mg").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].source, "web");
    assert_eq!(rows[1].source, "clinic");

    for uri in ["/api/dashboard", "/v1/dashboard"] {
        let (status, body) =
            send(app.clone(), Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let stats = &body["metformin 500mg"];
        assert_eq!(stats["very_positive"], 2);
        assert_eq!(stats["negative"], 0);
        assert_eq!(stats["sources"]["web"], 1);
        assert_eq!(stats["sources"]["clinic"], 1);
    }
}

#[tokio::test]
async fn test_feedback_rejects_empty_text() {
    let (app, _) = default_app().await;
    let (status, body) = send(
        app,
        json_post("/api/feedback", json!({"med": "metformin 500mg", "feedback": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let (app, _) = default_app().await;
    let request = Request::get("/health")
        .header(header::ORIGIN, "https://example.org")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = default_app().await;
    let response = app
        .oneshot(Request::get("/api/unknown").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
