//! # OCR Processing Module
//!
//! Turns an uploaded label photo into text with the Tesseract OCR engine and
//! hands that text to the drug matcher.
//!
//! ## Pipeline
//!
//! 1. Content-type and size validation (never retried)
//! 2. Decode (or rasterize page 0 of a PDF) + preprocess (grayscale, contrast,
//!    sharpen, upscale) on the blocking pool
//! 3. Recognition on a reused Tesseract instance, under a timeout, retried with backoff
//! 4. Text cleanup (trimmed, non-empty lines)
//! 5. Drug matching against the catalog
//!
//! ## Supported Formats
//!
//! - PNG
//! - JPEG/JPG
//! - PDF (first page, rendered with PDFium at the configured DPI)

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::drug_matcher::DrugMatcher;
use crate::errors::error_logging;
use crate::instance_manager::OcrInstanceManager;
use crate::observability::metrics;
use crate::ocr_config::{OcrConfig, RAW_TEXT_PREVIEW_CHARS};
use crate::ocr_errors::OcrError;
use crate::preprocessing::{self, PreprocessingError};
use crate::recovery::calculate_retry_delay;

/// Message returned for content types the service does not know
pub const ALLOWED_TYPES_MESSAGE: &str = "Only PNG, JPG, PDF allowed";

/// Label formats accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFormat {
    Png,
    Jpeg,
    Pdf,
}

impl LabelFormat {
    /// Map an upload content type to a label format
    ///
    /// ```rust
    /// use medication_victory_plan::ocr::LabelFormat;
    ///
    /// assert_eq!(LabelFormat::from_content_type("image/jpg").unwrap(), LabelFormat::Jpeg);
    /// assert!(LabelFormat::from_content_type("image/gif").is_err());
    /// ```
    pub fn from_content_type(content_type: &str) -> Result<Self, OcrError> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/png" => Ok(LabelFormat::Png),
            "image/jpeg" | "image/jpg" => Ok(LabelFormat::Jpeg),
            "application/pdf" => Ok(LabelFormat::Pdf),
            _ => Err(OcrError::Validation(ALLOWED_TYPES_MESSAGE.to_string())),
        }
    }
}

/// Validate an upload before any decoding work
pub fn validate_upload(
    bytes: &[u8],
    content_type: &str,
    config: &OcrConfig,
) -> Result<LabelFormat, OcrError> {
    let format = LabelFormat::from_content_type(content_type)?;

    let limit = match format {
        LabelFormat::Png => config.format_limits.png_max,
        LabelFormat::Jpeg => config.format_limits.jpeg_max,
        LabelFormat::Pdf => config.format_limits.pdf_max,
    };

    let size = bytes.len() as u64;
    if size == 0 {
        return Err(OcrError::Validation("uploaded file is empty".to_string()));
    }
    let limit = limit.min(config.max_file_size);
    if size > limit {
        return Err(OcrError::Validation(format!(
            "file too large for {:?} format: {} bytes (maximum allowed: {} bytes)",
            format, size, limit
        )));
    }

    Ok(format)
}

/// Clean up raw engine output: trim every line and drop empty ones
pub fn clean_extracted_text(text: &str) -> String {
    text.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Source of raw label text
///
/// The production implementation is [`TesseractExtractor`]; tests substitute
/// canned text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, OcrError>;
}

/// Tesseract-backed text extraction with retry and circuit breaking
pub struct TesseractExtractor {
    config: OcrConfig,
    instances: Arc<OcrInstanceManager>,
    circuit_breaker: CircuitBreaker,
}

impl TesseractExtractor {
    pub fn new(config: OcrConfig) -> Self {
        let circuit_breaker = CircuitBreaker::new("ocr", config.recovery.clone());
        Self {
            config,
            instances: Arc::new(OcrInstanceManager::new()),
            circuit_breaker,
        }
    }

    async fn extract(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, OcrError> {
        let format = validate_upload(&bytes, content_type, &self.config)?;

        if self.circuit_breaker.is_open() {
            metrics::update_circuit_breaker_state(self.circuit_breaker.component(), true);
            return Err(OcrError::CircuitOpen(
                "too many recent OCR failures, try again shortly".to_string(),
            ));
        }

        let start_time = Instant::now();
        let image_size = bytes.len() as u64;
        let preprocess = self.config.preprocess.clone();

        let png = tokio::task::spawn_blocking(move || {
            let image = match format {
                LabelFormat::Pdf => preprocessing::render_pdf_first_page(&bytes, preprocess.pdf_dpi)?,
                LabelFormat::Png | LabelFormat::Jpeg => preprocessing::decode_image(&bytes)?,
            };
            let prepared = preprocessing::prepare_for_ocr(&image, &preprocess)?;
            preprocessing::encode_png(&prepared)
        })
        .await
        .map_err(|e| OcrError::Extraction(format!("preprocessing task failed: {e}")))?
        .map_err(|e| match e {
            PreprocessingError::RendererUnavailable { .. } => OcrError::Initialization(e.to_string()),
            other => OcrError::ImageLoad(other.to_string()),
        })?;
        let png = Arc::new(png);

        let max_attempts = self.config.recovery.max_retries;
        let mut attempt = 1;
        loop {
            match self.perform_ocr_extraction(Arc::clone(&png)).await {
                Ok(text) => {
                    self.circuit_breaker.record_success();
                    metrics::update_circuit_breaker_state(self.circuit_breaker.component(), false);
                    metrics::record_ocr_metrics(true, start_time.elapsed(), image_size, attempt);

                    let cleaned = clean_extracted_text(&text);
                    info!(
                        attempt,
                        duration_ms = start_time.elapsed().as_millis() as u64,
                        characters = cleaned.len(),
                        "OCR extraction completed"
                    );
                    return Ok(cleaned);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay_ms = calculate_retry_delay(attempt, &self.config.recovery);
                    warn!(attempt, delay_ms, error = %err, "OCR extraction attempt failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(err) => {
                    let total_duration = start_time.elapsed();
                    self.circuit_breaker.record_failure();
                    metrics::update_circuit_breaker_state(
                        self.circuit_breaker.component(),
                        self.circuit_breaker.is_open(),
                    );
                    metrics::record_ocr_metrics(false, total_duration, image_size, attempt);
                    error_logging::log_ocr_error(
                        &err,
                        "ocr_extraction_retry",
                        Some(image_size),
                        Some(total_duration),
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Run one recognition pass on the blocking pool under the configured timeout
    async fn perform_ocr_extraction(&self, png: Arc<Vec<u8>>) -> Result<String, OcrError> {
        let instance = self
            .instances
            .get_instance(&self.config)
            .map_err(|e| OcrError::Initialization(e.to_string()))?;

        let timeout_secs = self.config.recovery.operation_timeout_secs;
        let task = tokio::task::spawn_blocking(move || {
            let mut tess = instance.lock();
            tess.set_image_from_mem(&png).map_err(|e| {
                OcrError::Extraction(format!("Failed to load image for OCR: {e}"))
            })?;
            tess.get_utf8_text().map_err(|e| {
                OcrError::Extraction(format!("Failed to extract text from image: {e}"))
            })
        });

        match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(OcrError::Extraction(format!(
                "OCR task failed: {join_err}"
            ))),
            Err(_) => Err(OcrError::Timeout(format!(
                "OCR operation timed out after {} seconds",
                timeout_secs
            ))),
        }
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract_text(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, OcrError> {
        self.extract(bytes, content_type).await
    }
}

/// Outcome of scanning one label
///
/// `name` and `dose` are empty when nothing in the catalog matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScan {
    pub name: String,
    pub dose: String,
    pub confidence: Option<f64>,
    /// First characters of the recognised text, for debugging
    pub raw_text: String,
}

/// Extract text from a label and match it against the catalog
pub async fn scan_label(
    extractor: &dyn TextExtractor,
    matcher: &DrugMatcher,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<LabelScan, OcrError> {
    let raw_text = extractor.extract_text(bytes, content_type).await?;
    let matched = matcher.match_text(&raw_text);
    metrics::record_match_metrics(matched.as_ref().map(|m| m.confidence));

    let raw_text: String = raw_text.chars().take(RAW_TEXT_PREVIEW_CHARS).collect();

    Ok(match matched {
        Some(found) => {
            info!(drug = %found.name, dose = %found.dose, confidence = found.confidence, "Label matched catalog entry");
            LabelScan {
                name: found.name,
                dose: found.dose,
                confidence: Some(found.confidence),
                raw_text,
            }
        }
        None => {
            info!("Label did not match any catalog entry");
            LabelScan {
                name: String::new(),
                dose: String::new(),
                confidence: None,
                raw_text,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DrugCatalog;
    use crate::errors::AppError;

    struct CannedText(&'static str);

    #[async_trait]
    impl TextExtractor for CannedText {
        async fn extract_text(
            &self,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    fn matcher() -> DrugMatcher {
        let catalog = DrugCatalog::from_json_str(
            r#"[{"name": "Metformin", "dose": "500mg"}, {"name": "Metoprolol", "dose": "50mg"}]"#,
        )
        .unwrap();
        DrugMatcher::new(Arc::new(catalog))
    }

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(LabelFormat::from_content_type("image/png").unwrap(), LabelFormat::Png);
        assert_eq!(LabelFormat::from_content_type("IMAGE/JPEG").unwrap(), LabelFormat::Jpeg);
        assert_eq!(LabelFormat::from_content_type("application/pdf").unwrap(), LabelFormat::Pdf);
        assert!(matches!(
            LabelFormat::from_content_type("text/plain"),
            Err(OcrError::Validation(msg)) if msg == ALLOWED_TYPES_MESSAGE
        ));
    }

    #[test]
    fn test_validate_upload_accepts_pdf_and_rejects_empty() {
        let mut config = OcrConfig::default();
        assert_eq!(
            validate_upload(b"%PDF-1.7", "application/pdf", &config).unwrap(),
            LabelFormat::Pdf
        );
        assert!(matches!(
            validate_upload(b"", "image/png", &config),
            Err(OcrError::Validation(_))
        ));

        config.format_limits.pdf_max = 4;
        assert!(matches!(
            validate_upload(b"%PDF-1.7", "application/pdf", &config),
            Err(OcrError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_undecodable_upload_fails_before_recognition() {
        let extractor = TesseractExtractor::new(OcrConfig::default());
        let err = extractor
            .extract_text(b"definitely not a png".to_vec(), "image/png")
            .await
            .unwrap_err();

        assert!(matches!(err, OcrError::ImageLoad(_)));
        assert!(matches!(AppError::from(err), AppError::Validation(_)));
        assert_eq!(extractor.instances.instance_count(), 0);
    }

    #[tokio::test]
    async fn test_pdf_upload_goes_through_renderer() {
        let extractor = TesseractExtractor::new(OcrConfig::default());
        let err = extractor
            .extract_text(b"%PDF-1.7 truncated".to_vec(), "application/pdf")
            .await
            .unwrap_err();

        // Rendering fails (bad PDF, or no PDFium on this host) before Tesseract is touched
        assert!(matches!(err, OcrError::ImageLoad(_) | OcrError::Initialization(_)));
        assert_eq!(extractor.instances.instance_count(), 0);
    }

    #[test]
    fn test_validate_upload_enforces_size_limit() {
        let mut config = OcrConfig::default();
        config.format_limits.jpeg_max = 4;
        assert!(validate_upload(b"1234", "image/jpeg", &config).is_ok());
        assert!(validate_upload(b"12345", "image/jpeg", &config).is_err());
    }

    #[test]
    fn test_clean_extracted_text() {
        let raw = "  METFORMIN HCL  \n\n   500 mg tablets\n \n";
        assert_eq!(clean_extracted_text(raw), "METFORMIN HCL\n500 mg tablets");
    }

    #[tokio::test]
    async fn test_scan_label_matches_catalog() {
        let scan = scan_label(
            &CannedText("Take METFORMIN 500mg twice daily"),
            &matcher(),
            vec![1],
            "image/png",
        )
        .await
        .unwrap();
        assert_eq!(scan.name, "Metformin");
        assert_eq!(scan.dose, "500mg");
        assert_eq!(scan.confidence, Some(1.0));
    }

    #[tokio::test]
    async fn test_scan_label_without_match_returns_empty_fields() {
        let scan = scan_label(
            &CannedText("unrelated text about vitamins"),
            &matcher(),
            vec![1],
            "image/png",
        )
        .await
        .unwrap();
        assert_eq!(scan.name, "");
        assert_eq!(scan.dose, "");
        assert_eq!(scan.confidence, None);
        assert_eq!(scan.raw_text, "unrelated text about vitamins");
    }

    #[tokio::test]
    async fn test_scan_label_truncates_raw_text() {
        let long = Box::leak("x".repeat(500).into_boxed_str());
        let scan = scan_label(&CannedText(long), &matcher(), vec![1], "image/png")
            .await
            .unwrap();
        assert_eq!(scan.raw_text.chars().count(), RAW_TEXT_PREVIEW_CHARS);
    }
}
