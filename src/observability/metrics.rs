//! Metrics collection and Prometheus export module.
//!
//! This module provides:
//! - Prometheus recorder setup with global labels
//! - A small hyper server for `/metrics` and health probes
//! - Recording functions for every instrumented component

use anyhow::Result;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::SqlitePool;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;

use crate::observability_config::ObservabilityConfig;

/// Check authentication token from the Authorization header
///
/// No token is required when `expected_token` is unset or empty.
pub fn check_auth(headers: &hyper::HeaderMap, expected_token: Option<&str>) -> bool {
    let expected_token = match expected_token {
        Some(token) if !token.is_empty() => token,
        _ => return true,
    };

    headers
        .get(hyper::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected_token)
}

/// Initialize metrics collection with Prometheus exporter and configuration
pub fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<PrometheusHandle> {
    let mut builder = PrometheusBuilder::new();
    for (key, value) in &config.tags {
        builder = builder.add_global_label(key.clone(), value.clone());
    }
    let handle = builder.install_recorder()?;

    tracing::info!(
        metrics_enabled = %config.enable_metrics_export,
        global_labels = config.tags.len(),
        "Metrics collection initialized"
    );
    Ok(handle)
}

/// Start the metrics server with liveness and readiness probes
///
/// Readiness runs a `SELECT 1` against the database when a pool is given.
pub async fn start_metrics_server(
    metrics_handle: PrometheusHandle,
    port: u16,
    db_pool: Option<SqlitePool>,
) -> Result<()> {
    // Localhost only unless explicitly configured
    let bind_all = std::env::var("METRICS_BIND_ALL_INTERFACES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    let addr = if bind_all {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port)
    } else {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    };
    let auth_token = std::env::var("METRICS_AUTH_TOKEN").ok();

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, bind_all, "Metrics server listening");

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let metrics_handle = metrics_handle.clone();
                    let db_pool = db_pool.clone();
                    let auth_token = auth_token.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = hyper::service::service_fn(
                            move |req: hyper::Request<hyper::body::Incoming>| {
                                let metrics_handle = metrics_handle.clone();
                                let db_pool = db_pool.clone();
                                let authorized = check_auth(req.headers(), auth_token.as_deref());
                                async move {
                                    if !authorized {
                                        let mut response =
                                            hyper::Response::new("Unauthorized".to_string());
                                        *response.status_mut() = hyper::StatusCode::UNAUTHORIZED;
                                        response.headers_mut().insert(
                                            "www-authenticate",
                                            hyper::header::HeaderValue::from_static("Bearer"),
                                        );
                                        return Ok::<_, std::convert::Infallible>(response);
                                    }

                                    match (req.method(), req.uri().path()) {
                                        (&hyper::Method::GET, "/metrics") => {
                                            let mut response =
                                                hyper::Response::new(metrics_handle.render());
                                            response.headers_mut().insert(
                                                "content-type",
                                                hyper::header::HeaderValue::from_static(
                                                    "text/plain; version=0.0.4; charset=utf-8",
                                                ),
                                            );
                                            Ok(response)
                                        }
                                        (&hyper::Method::GET, "/health/live") => {
                                            Ok(hyper::Response::new("OK".to_string()))
                                        }
                                        (&hyper::Method::GET, "/health/ready") => {
                                            match check_readiness(db_pool.as_ref()).await {
                                                Ok(()) => Ok(hyper::Response::new("OK".to_string())),
                                                Err(e) => {
                                                    let mut response = hyper::Response::new(
                                                        format!("NOT READY: {}", e),
                                                    );
                                                    *response.status_mut() =
                                                        hyper::StatusCode::SERVICE_UNAVAILABLE;
                                                    Ok(response)
                                                }
                                            }
                                        }
                                        _ => {
                                            let mut response =
                                                hyper::Response::new("Not Found".to_string());
                                            *response.status_mut() = hyper::StatusCode::NOT_FOUND;
                                            Ok(response)
                                        }
                                    }
                                }
                            },
                        );

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            tracing::error!(error = %err, peer = %peer_addr, "Error serving metrics connection");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error accepting metrics connection");
                }
            }
        }
    });

    Ok(())
}

/// Readiness probe: the database must answer a trivial query
pub async fn check_readiness(db_pool: Option<&SqlitePool>) -> Result<()> {
    let start = std::time::Instant::now();
    let result = match db_pool {
        Some(pool) => sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e)),
        None => Ok(()),
    };
    record_health_check_metrics("database", result.is_ok(), start.elapsed());
    result
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Record OCR operation metrics
pub fn record_ocr_metrics(success: bool, duration: Duration, image_size: u64, attempts: u32) {
    metrics::counter!("ocr_operations_total", "result" => outcome(success)).increment(1);
    metrics::histogram!("ocr_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("ocr_image_size_bytes").record(image_size as f64);
    metrics::histogram!("ocr_retry_attempts").record(f64::from(attempts));
}

/// Record the outcome of matching OCR text against the catalog
pub fn record_match_metrics(confidence: Option<f64>) {
    match confidence {
        Some(confidence) => {
            metrics::counter!("drug_match_total", "result" => "matched").increment(1);
            metrics::histogram!("drug_match_confidence").record(confidence);
        }
        None => {
            metrics::counter!("drug_match_total", "result" => "unmatched").increment(1);
        }
    }
}

/// Record a hosted model call (advice LLM or sentiment classifier)
pub fn record_upstream_metrics(component: &'static str, success: bool, duration: Duration, attempts: u32) {
    metrics::counter!("upstream_requests_total", "component" => component, "result" => outcome(success))
        .increment(1);
    metrics::histogram!("upstream_duration_seconds", "component" => component)
        .record(duration.as_secs_f64());
    metrics::histogram!("upstream_attempts", "component" => component).record(f64::from(attempts));
}

/// Record a classified feedback label
pub fn record_sentiment_label(label: &'static str) {
    metrics::counter!("feedback_sentiment_total", "sentiment" => label).increment(1);
}

/// Record database operation metrics
pub fn record_db_metrics(operation: &'static str, duration: Duration) {
    metrics::counter!("db_operations_total", "operation" => operation).increment(1);
    metrics::histogram!("db_operation_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record HTTP request metrics
pub fn record_request_metrics(method: &str, route: &str, status: u16, duration: Duration) {
    let method = method.to_string();
    let route = route.to_string();
    let status = status.to_string();
    metrics::counter!("requests_total", "method" => method, "route" => route.clone(), "status" => status)
        .increment(1);
    metrics::histogram!("request_duration_seconds", "route" => route).record(duration.as_secs_f64());
}

/// Record health check metrics
pub fn record_health_check_metrics(check_type: &'static str, success: bool, duration: Duration) {
    metrics::counter!("health_checks_total", "type" => check_type, "result" => outcome(success))
        .increment(1);
    metrics::histogram!("health_check_duration_seconds", "type" => check_type)
        .record(duration.as_secs_f64());
    metrics::gauge!("health_check_status", "type" => check_type).set(if success { 1.0 } else { 0.0 });
}

/// Record error rate metrics
pub fn record_error_metrics(error_type: &'static str, component: &'static str) {
    metrics::counter!("errors_total", "type" => error_type, "component" => component).increment(1);
}

/// Record application startup metrics
pub fn record_startup_metrics(duration: Duration) {
    metrics::histogram!("application_startup_duration_seconds").record(duration.as_secs_f64());
    metrics::counter!("application_starts_total").increment(1);
}

/// Update circuit breaker state metric for one component
pub fn update_circuit_breaker_state(component: &'static str, is_open: bool) {
    metrics::gauge!("circuit_breaker_state", "component" => component)
        .set(if is_open { 1.0 } else { 0.0 });
}
