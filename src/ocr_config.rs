//! # OCR Configuration Module
//!
//! This module defines configuration structures for label OCR,
//! including upload limits, preprocessing parameters and Tesseract settings.

use crate::errors::{AppError, AppResult};
pub use crate::recovery::RecoveryConfig;

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng";
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB limit for label uploads
pub const RAW_TEXT_PREVIEW_CHARS: usize = 200;

/// Format-specific file size limits for label uploads
#[derive(Debug, Clone)]
pub struct FormatSizeLimits {
    /// PNG format limit (higher due to lossless compression)
    pub png_max: u64,
    /// JPEG format limit
    pub jpeg_max: u64,
    /// PDF format limit
    pub pdf_max: u64,
}

impl Default for FormatSizeLimits {
    fn default() -> Self {
        Self {
            png_max: 15 * 1024 * 1024,  // 15MB for PNG
            jpeg_max: 10 * 1024 * 1024, // 10MB for JPEG
            pdf_max: 15 * 1024 * 1024,  // 15MB for PDF
        }
    }
}

impl FormatSizeLimits {
    /// Validate format size limits
    pub fn validate(&self) -> AppResult<()> {
        if self.png_max == 0 {
            return Err(AppError::Config("png_max must be greater than 0".to_string()));
        }
        if self.jpeg_max == 0 {
            return Err(AppError::Config("jpeg_max must be greater than 0".to_string()));
        }
        if self.pdf_max == 0 {
            return Err(AppError::Config("pdf_max must be greater than 0".to_string()));
        }
        if self.jpeg_max > self.png_max {
            return Err(AppError::Config(format!(
                "jpeg_max ({}) should not exceed png_max ({})",
                self.jpeg_max, self.png_max
            )));
        }
        Ok(())
    }
}

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    #[default]
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of text
    SingleBlock = 6,
    /// Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SparseText => "11",
        }
    }
}

/// Image preprocessing applied before recognition
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Contrast adjustment passed to `image::imageops::contrast` (percent)
    pub contrast: f32,
    /// Labels narrower than this are upscaled
    pub min_width: u32,
    /// Smallest integer upscale factor applied to narrow labels
    pub min_upscale: u32,
    /// Resolution used to rasterize the first page of PDF labels
    pub pdf_dpi: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            // ((100 + 41.4) / 100)^2 ≈ 2.0, i.e. doubles contrast
            contrast: 41.4,
            min_width: 800,
            min_upscale: 2,
            pdf_dpi: 300,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !self.contrast.is_finite() || self.contrast <= -100.0 {
            return Err(AppError::Config(format!(
                "contrast ({}) must be a finite value above -100",
                self.contrast
            )));
        }
        if self.min_width == 0 {
            return Err(AppError::Config("min_width must be greater than 0".to_string()));
        }
        if self.min_upscale == 0 {
            return Err(AppError::Config("min_upscale must be greater than 0".to_string()));
        }
        if !(72..=600).contains(&self.pdf_dpi) {
            return Err(AppError::Config(format!(
                "pdf_dpi ({}) must be between 72 and 600",
                self.pdf_dpi
            )));
        }
        Ok(())
    }
}

/// Configuration structure for OCR processing
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// OCR language codes (e.g., "eng", "eng+fra")
    pub languages: String,
    /// Maximum allowed upload size in bytes (general limit)
    pub max_file_size: u64,
    /// Format-specific size limits
    pub format_limits: FormatSizeLimits,
    /// Recovery and error handling configuration
    pub recovery: RecoveryConfig,
    /// Default page segmentation mode for OCR
    pub psm_mode: PageSegMode,
    /// Preprocessing parameters
    pub preprocess: PreprocessConfig,
    /// Optional path to a tessdata directory
    pub tessdata_path: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            max_file_size: MAX_FILE_SIZE,
            format_limits: FormatSizeLimits::default(),
            recovery: RecoveryConfig::default(),
            psm_mode: PageSegMode::default(),
            preprocess: PreprocessConfig::default(),
            tessdata_path: None,
        }
    }
}

impl OcrConfig {
    /// Validate OCR configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(AppError::Config("languages cannot be empty".to_string()));
        }

        if self.max_file_size == 0 {
            return Err(AppError::Config(
                "max_file_size must be greater than 0".to_string(),
            ));
        }

        self.format_limits.validate()?;
        self.recovery.validate()?;
        self.preprocess.validate()?;

        Ok(())
    }
}
