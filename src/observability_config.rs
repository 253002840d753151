//! # Observability Configuration
//!
//! Environment-specific settings for logging and metrics export.

use std::env;

use crate::errors::{AppError, AppResult};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!(
                "LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                other
            ))),
        }
    }
}

/// Observability configuration for different environments
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// Prometheus metrics endpoint port
    pub metrics_port: u16,
    /// Log level for this crate's events
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Whether to serve Prometheus metrics
    pub enable_metrics_export: bool,
    /// Global labels attached to every metric
    pub tags: Vec<(String, String)>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            metrics_port: 9090,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            enable_metrics_export: true,
            tags: Vec::new(),
        }
    }
}

impl ObservabilityConfig {
    /// Load configuration from environment variables
    ///
    /// `LOG_FORMAT` defaults to pretty output in development and JSON elsewhere.
    pub fn from_env() -> AppResult<Self> {
        let environment =
            env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let log_format = match env::var("LOG_FORMAT") {
            Ok(value) => LogFormat::parse(&value)?,
            Err(_) if environment == "development" => LogFormat::Pretty,
            Err(_) => LogFormat::Json,
        };

        let metrics_port = env::var("METRICS_PORT")
            .unwrap_or_else(|_| "9090".to_string())
            .parse()
            .map_err(|_| AppError::Config("METRICS_PORT must be a valid port number".to_string()))?;

        let mut config = Self {
            environment,
            metrics_port,
            log_level: env::var("OBSERVABILITY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            enable_metrics_export: env::var("ENABLE_METRICS_EXPORT")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            tags: env::var("OBSERVABILITY_TAGS")
                .map(|raw| parse_tags(&raw))
                .unwrap_or_default(),
        };
        config.add_default_tags();
        Ok(config)
    }

    /// Add default tags based on environment and configuration
    fn add_default_tags(&mut self) {
        self.tags
            .push(("environment".to_string(), self.environment.clone()));
        self.tags
            .push(("service".to_string(), "medication-victory-plan".to_string()));

        if let Ok(hostname) = env::var("HOSTNAME") {
            self.tags.push(("hostname".to_string(), hostname));
        }
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.metrics_port == 0 {
            return Err(AppError::Config(format!(
                "Invalid metrics port: {}",
                self.metrics_port
            )));
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "Invalid log level '{}', expected one of {:?}",
                self.log_level, LEVELS
            )));
        }

        Ok(())
    }
}

/// Parse tags from environment variable string
/// Format: "key1=value1,key2=value2,key3=value3"
fn parse_tags(tags_str: &str) -> Vec<(String, String)> {
    tags_str
        .split(',')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) if !key.trim().is_empty() => {
                    Some((key.trim().to_string(), value.trim().to_string()))
                }
                _ => None,
            }
        })
        .collect()
}
