//! # Application Error Types
//!
//! This module defines common error types used throughout the Medication Victory Plan service.
//! It provides structured error handling for the matcher, OCR, storage and upstream adapters.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors (catalog, interactions, environment)
    Config(String),
    /// Validation errors (request fields, uploads)
    Validation(String),
    /// Database operation errors
    Database(String),
    /// OCR processing errors
    Ocr(String),
    /// Hosted model errors (advice LLM, sentiment inference)
    Upstream(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Database(msg) => write!(f, "[DATABASE] {}", msg),
            AppError::Ocr(msg) => write!(f, "[OCR] {}", msg),
            AppError::Upstream(msg) => write!(f, "[UPSTREAM] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<crate::ocr_errors::OcrError> for AppError {
    fn from(err: crate::ocr_errors::OcrError) -> Self {
        match err {
            // Undecodable uploads are the caller's fault, not the engine's
            crate::ocr_errors::OcrError::Validation(msg)
            | crate::ocr_errors::OcrError::ImageLoad(msg) => AppError::Validation(msg),
            other => AppError::Ocr(other.to_string()),
        }
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::{error, warn};

    /// Log database operation errors with contextual information
    pub fn log_database_error(
        error: &impl std::fmt::Display,
        operation: &str,
        med_key: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            med_key = ?med_key,
            "Database operation failed"
        );
    }

    /// Log OCR processing errors with image and processing context
    pub fn log_ocr_error(
        error: &impl std::fmt::Display,
        operation: &str,
        image_size: Option<u64>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            image_size_bytes = ?image_size,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "OCR processing failed"
        );
    }

    /// Log hosted model errors with endpoint context
    pub fn log_upstream_error(
        error: &impl std::fmt::Display,
        operation: &str,
        endpoint: Option<&str>,
        attempt_count: Option<u32>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            endpoint = ?endpoint,
            attempt_count = ?attempt_count,
            "Upstream operation failed"
        );
    }

    /// Log rejected client input; warn level since the service itself is healthy
    pub fn log_validation_error(
        error: &impl std::fmt::Display,
        operation: &str,
        input_type: &str,
        input_value: Option<&str>,
    ) {
        warn!(
            error = %error,
            operation = %operation,
            input_type = %input_type,
            input_value = ?input_value.map(|v| v.chars().take(100).collect::<String>()),
            "Validation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(
        error: &impl std::fmt::Display,
        config_key: &str,
        operation: &str,
    ) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr_errors::OcrError;

    #[test]
    fn test_display_uses_bracketed_tags() {
        assert_eq!(
            AppError::Config("catalog missing".to_string()).to_string(),
            "[CONFIG] catalog missing"
        );
        assert_eq!(
            AppError::Upstream("timeout".to_string()).to_string(),
            "[UPSTREAM] timeout"
        );
    }

    #[test]
    fn test_ocr_validation_errors_become_validation() {
        let err: AppError = OcrError::Validation("uploaded file is empty".to_string()).into();
        assert_eq!(err, AppError::Validation("uploaded file is empty".to_string()));

        let err: AppError = OcrError::Timeout("30s".to_string()).into();
        assert!(matches!(err, AppError::Ocr(_)));
    }

    #[test]
    fn test_undecodable_image_is_a_client_error() {
        let err: AppError = OcrError::ImageLoad("invalid PNG signature".to_string()).into();
        assert_eq!(err, AppError::Validation("invalid PNG signature".to_string()));

        let err: AppError = OcrError::Initialization("PDFium library not found".to_string()).into();
        assert!(matches!(err, AppError::Ocr(_)));
    }
}
