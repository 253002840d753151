//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Metrics collection and Prometheus export
//! - Liveness and readiness probes served next to `/metrics`

pub mod metrics;
pub mod tracing_mod;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::observability_config::ObservabilityConfig;

pub use tracing_mod::{db_span, ocr_span, request_span};

/// Initialize logging only
///
/// Used early in startup so that configuration errors are logged.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;
    tracing_mod::init_tracing_with_config(config)
}

/// Install the Prometheus recorder and start the metrics server
///
/// Does nothing when metrics export is disabled.
pub async fn init_metrics(config: &ObservabilityConfig, db_pool: Option<SqlitePool>) -> Result<()> {
    if !config.enable_metrics_export {
        tracing::info!("Metrics export disabled");
        return Ok(());
    }

    let metrics_handle = metrics::init_metrics_with_config(config)?;
    metrics::start_metrics_server(metrics_handle, config.metrics_port, db_pool).await?;

    tracing::info!(
        environment = %config.environment,
        metrics_port = %config.metrics_port,
        "Observability stack initialized successfully"
    );
    Ok(())
}
