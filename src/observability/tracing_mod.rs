//! Tracing and logging setup module.
//!
//! This module provides:
//! - Structured logging configuration
//! - Tracing span creation utilities

use anyhow::Result;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Build the log filter: `RUST_LOG` first, then this crate at the configured
/// level with noisy dependencies held at `warn`
pub fn build_env_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive(format!("medication_victory_plan={}", config.log_level).parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?))
}

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_env_filter(config)?;

    match config.log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true),
                )
                .try_init()?;
        }
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        log_format = ?config.log_format,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str) -> tracing::Span {
    tracing::info_span!("ocr_operation", operation = operation, component = "ocr")
}

/// Create a span for database operations
pub fn db_span(operation: &str, table: &str) -> tracing::Span {
    tracing::info_span!(
        "db_operation",
        operation = operation,
        table = table,
        component = "database"
    )
}

/// Create a span for API requests
pub fn request_span(method: &str, route: &str) -> tracing::Span {
    tracing::info_span!(
        "api_request",
        method = method,
        route = route,
        component = "api"
    )
}
