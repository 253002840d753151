//! # Hosted Model Transport
//!
//! JSON-over-HTTP calls to hosted models (the advice LLM and the sentiment
//! classifier) with retry, backoff and a per-component circuit breaker.
//!
//! Transport errors, `429 Too Many Requests` and `5xx` responses are retried
//! and count against the breaker once retries run out. Any other non-success
//! status fails immediately without touching the breaker.

use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::errors::{error_logging, AppError, AppResult};
use crate::observability::metrics;
use crate::recovery::{calculate_retry_delay, RecoveryConfig};

/// Outcome of a single attempt
#[derive(Debug)]
enum AttemptError {
    Retryable(String),
    Fatal(String),
}

impl AttemptError {
    fn message(&self) -> &str {
        match self {
            AttemptError::Retryable(msg) | AttemptError::Fatal(msg) => msg,
        }
    }
}

/// Build the shared HTTP client used by upstream adapters
pub fn build_http_client(timeout_secs: u64) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
        .build()
        .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Whether an HTTP status is worth retrying
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Everything needed to POST a JSON payload to a hosted model
pub struct JsonPost<'a> {
    pub client: &'a reqwest::Client,
    pub url: &'a str,
    pub bearer_token: Option<&'a str>,
    pub payload: &'a Value,
    pub breaker: &'a CircuitBreaker,
    pub recovery: &'a RecoveryConfig,
}

impl JsonPost<'_> {
    /// Send the request, retrying as configured, and return the parsed JSON body
    pub async fn send(&self) -> AppResult<Value> {
        let component = self.breaker.component();

        if self.breaker.is_open() {
            metrics::update_circuit_breaker_state(component, true);
            return Err(AppError::Upstream(format!(
                "{} is temporarily unavailable after repeated failures",
                component
            )));
        }

        let start_time = Instant::now();
        let max_attempts = self.recovery.max_retries;
        let mut attempt = 1;

        loop {
            match self.attempt().await {
                Ok(body) => {
                    self.breaker.record_success();
                    metrics::update_circuit_breaker_state(component, false);
                    metrics::record_upstream_metrics(component, true, start_time.elapsed(), attempt);
                    debug!(component, attempt, "Upstream call succeeded");
                    return Ok(body);
                }
                Err(AttemptError::Retryable(msg)) if attempt < max_attempts => {
                    let delay_ms = calculate_retry_delay(attempt, self.recovery);
                    warn!(component, attempt, delay_ms, error = %msg, "Upstream call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(err) => {
                    // Rejected requests say nothing about the model's health
                    if matches!(err, AttemptError::Retryable(_)) {
                        self.breaker.record_failure();
                    }
                    metrics::update_circuit_breaker_state(component, self.breaker.is_open());
                    metrics::record_upstream_metrics(component, false, start_time.elapsed(), attempt);
                    error_logging::log_upstream_error(
                        &err.message(),
                        component,
                        Some(self.url),
                        Some(attempt),
                    );
                    return Err(AppError::Upstream(format!(
                        "{} request failed: {}",
                        component,
                        err.message()
                    )));
                }
            }
        }
    }

    async fn attempt(&self) -> Result<Value, AttemptError> {
        let mut request = self.client.post(self.url).json(self.payload);
        if let Some(token) = self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            let msg = format!("HTTP error {status}: {body}");
            return Err(if is_retryable_status(status) {
                AttemptError::Retryable(msg)
            } else {
                AttemptError::Fatal(msg)
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AttemptError::Fatal(format!("invalid JSON response: {e}")))
    }
}
