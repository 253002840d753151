//! # Image Preprocessing Module
//!
//! Prepares a photographed label for Tesseract: grayscale, contrast boost,
//! sharpening and upscaling of narrow photos. PDF labels are rasterized
//! first (page 0 only) with PDFium.
//!
//! Decoding and upscaling are bounded so a crafted upload cannot make the
//! process allocate an unbounded buffer.

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};
use pdfium_render::prelude::*;
use std::io::Cursor;
use tracing::{debug, warn};

use crate::ocr_config::PreprocessConfig;

/// Largest width or height accepted from a decoded upload
pub const MAX_SOURCE_DIMENSION: u32 = 16_384;

/// Largest image (in pixels) handed to Tesseract after upscaling
pub const MAX_OCR_PIXELS: u64 = 40_000_000;

/// Decoder allocation budget
const MAX_DECODE_ALLOC_BYTES: u64 = 512 * 1024 * 1024;

/// Longest side of a rendered PDF page
const MAX_PDF_RENDER_DIMENSION: u32 = 5_000;

const POINTS_PER_INCH: f32 = 72.0;

/// 3x3 sharpen kernel (centre 32/16, neighbours -2/16)
const SHARPEN_KERNEL: [f32; 9] = [
    -0.125, -0.125, -0.125, //
    -0.125, 2.0, -0.125, //
    -0.125, -0.125, -0.125,
];

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone)]
pub enum PreprocessingError {
    /// Failed to load or decode image
    ImageLoad { message: String },
    /// Image has zero width or height
    EmptyImage,
    /// Re-encoding the processed image failed
    Encode { message: String },
    /// Upscaled output would exceed the pixel budget
    TooLarge { width: u32, height: u32 },
    /// PDF could not be opened or rendered
    PdfRender { message: String },
    /// The PDFium library could not be loaded
    RendererUnavailable { message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::ImageLoad { message } => {
                write!(f, "Failed to load image: {}", message)
            }
            PreprocessingError::EmptyImage => write!(f, "Image has no pixels"),
            PreprocessingError::Encode { message } => {
                write!(f, "Failed to encode processed image: {}", message)
            }
            PreprocessingError::TooLarge { width, height } => write!(
                f,
                "Image of {}x{} pixels is too large to process",
                width, height
            ),
            PreprocessingError::PdfRender { message } => {
                write!(f, "Failed to render PDF label: {}", message)
            }
            PreprocessingError::RendererUnavailable { message } => {
                write!(f, "PDF renderer unavailable: {}", message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Decode raw upload bytes into an image, within dimension and allocation limits
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, PreprocessingError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_SOURCE_DIMENSION);
    limits.max_image_height = Some(MAX_SOURCE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC_BYTES);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PreprocessingError::ImageLoad {
            message: e.to_string(),
        })?;
    reader.limits(limits);

    reader.decode().map_err(|e| PreprocessingError::ImageLoad {
        message: e.to_string(),
    })
}

/// Load the PDFium library: `PDFIUM_DYNAMIC_LIB_PATH` first, then the system search path
fn load_pdfium() -> Result<Pdfium, PreprocessingError> {
    let bindings = match std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        Ok(path) => Pdfium::bind_to_library(&path),
        Err(_) => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PreprocessingError::RendererUnavailable {
        message: e.to_string(),
    })?;
    Ok(Pdfium::new(bindings))
}

/// Pixel size of a page rendered at `dpi`, longest side capped
///
/// # Examples
///
/// ```
/// use medication_victory_plan::preprocessing::pdf_render_size;
///
/// // US Letter at 300 dpi
/// assert_eq!(pdf_render_size(612.0, 792.0, 300), (2550, 3300));
/// ```
pub fn pdf_render_size(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let width = (width_points * scale).round().max(1.0);
    let height = (height_points * scale).round().max(1.0);

    let longest = width.max(height);
    let cap = MAX_PDF_RENDER_DIMENSION as f32;
    let shrink = if longest > cap { cap / longest } else { 1.0 };

    (
        ((width * shrink).round() as u32).max(1),
        ((height * shrink).round() as u32).max(1),
    )
}

/// Rasterize the first page of a PDF label
pub fn render_pdf_first_page(bytes: &[u8], dpi: u32) -> Result<DynamicImage, PreprocessingError> {
    let pdfium = load_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| PreprocessingError::PdfRender {
            message: format!("invalid PDF: {e}"),
        })?;
    let page = document
        .pages()
        .get(0)
        .map_err(|e| PreprocessingError::PdfRender {
            message: format!("PDF has no first page: {e}"),
        })?;

    let (width_points, height_points) = (page.width().value, page.height().value);
    let (width, height) = pdf_render_size(width_points, height_points, dpi);
    if (width as f32) < width_points * dpi as f32 / POINTS_PER_INCH - 1.0 {
        warn!(width, height, dpi, "PDF page capped below requested resolution");
    }

    let config = PdfRenderConfig::new()
        .set_target_width(width as i32)
        .set_maximum_height(height as i32);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| PreprocessingError::PdfRender {
            message: format!("rendering failed: {e}"),
        })?;

    debug!(width, height, dpi, "Rendered PDF label page");
    Ok(bitmap.as_image())
}

/// Upscale factor for an image of the given width, or `None` when wide enough.
///
/// # Examples
///
/// ```
/// use medication_victory_plan::ocr_config::PreprocessConfig;
/// use medication_victory_plan::preprocessing::upscale_factor;
///
/// let config = PreprocessConfig::default();
/// assert_eq!(upscale_factor(1200, &config), None);
/// assert_eq!(upscale_factor(500, &config), Some(2));
/// assert_eq!(upscale_factor(100, &config), Some(8));
/// ```
pub fn upscale_factor(width: u32, config: &PreprocessConfig) -> Option<u32> {
    if width == 0 || width >= config.min_width {
        return None;
    }
    Some((config.min_width / width).max(config.min_upscale))
}

/// Upscaled dimensions, rejected when they overflow or exceed [`MAX_OCR_PIXELS`]
fn upscaled_size(width: u32, height: u32, factor: u32) -> Result<(u32, u32), PreprocessingError> {
    let too_large = PreprocessingError::TooLarge { width, height };
    let target_width = width.checked_mul(factor).ok_or_else(|| too_large.clone())?;
    let target_height = height.checked_mul(factor).ok_or_else(|| too_large.clone())?;

    if u64::from(target_width) * u64::from(target_height) > MAX_OCR_PIXELS {
        return Err(too_large);
    }
    Ok((target_width, target_height))
}

/// Apply the full preprocessing chain
pub fn prepare_for_ocr(
    image: &DynamicImage,
    config: &PreprocessConfig,
) -> Result<DynamicImage, PreprocessingError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessingError::EmptyImage);
    }
    if let Some(factor) = upscale_factor(width, config) {
        upscaled_size(width, height, factor)?;
    }

    let gray = image.grayscale().adjust_contrast(config.contrast);
    let sharpened = gray.filter3x3(&SHARPEN_KERNEL);

    let processed = match upscale_factor(width, config) {
        Some(factor) => {
            let (target_width, target_height) = upscaled_size(width, height, factor)?;
            sharpened.resize_exact(
                target_width,
                target_height,
                image::imageops::FilterType::Lanczos3,
            )
        }
        None => sharpened,
    };

    Ok(processed)
}

/// Encode an image as PNG bytes for Tesseract
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, PreprocessingError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| PreprocessingError::Encode {
            message: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}
