//! # OCR Error Types Module
//!
//! This module defines custom error types used throughout the label OCR pipeline.
//! It provides structured error handling for various OCR operations and failure modes.

/// Custom error types for OCR operations
#[derive(Debug, Clone)]
pub enum OcrError {
    /// Upload validation errors (empty payload, size limits)
    Validation(String),
    /// OCR engine initialization errors
    Initialization(String),
    /// The upload could not be decoded, rendered or preprocessed
    ImageLoad(String),
    /// Text extraction errors
    Extraction(String),
    /// Timeout errors
    Timeout(String),
    /// Circuit breaker is open after repeated failures
    CircuitOpen(String),
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::Validation(msg) => write!(f, "[VALIDATION] Label upload validation failed: {}", msg),
            OcrError::Initialization(msg) => write!(f, "[OCR_INIT] OCR engine initialization failed: {}", msg),
            OcrError::ImageLoad(msg) => write!(f, "[IMAGE_LOAD] Failed to load label image for OCR processing: {}", msg),
            OcrError::Extraction(msg) => write!(f, "[OCR_EXTRACT] Text extraction from label failed: {}", msg),
            OcrError::Timeout(msg) => write!(f, "[OCR_TIMEOUT] OCR processing timed out: {}", msg),
            OcrError::CircuitOpen(msg) => write!(f, "[OCR_CIRCUIT] OCR temporarily disabled: {}", msg),
        }
    }
}

impl std::error::Error for OcrError {}

impl From<anyhow::Error> for OcrError {
    fn from(err: anyhow::Error) -> Self {
        OcrError::Extraction(err.to_string())
    }
}

impl OcrError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OcrError::Initialization(_) | OcrError::Extraction(_) | OcrError::Timeout(_)
        )
    }
}
