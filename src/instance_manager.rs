//! # OCR Instance Manager Module
//!
//! This module provides thread-safe OCR instance management for reusing Tesseract instances.
//! Reusing instances avoids paying the engine initialization cost on every label.

use leptess::LepTess;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::ocr_config::OcrConfig;

/// Thread-safe pool of Tesseract instances keyed by language configuration
///
/// - Instances are created on first request for a language combination
/// - Instances are reused for subsequent requests with the same configuration
/// - Each instance sits behind its own mutex, so one label is recognised at a time per instance
pub struct OcrInstanceManager {
    instances: Mutex<HashMap<String, Arc<Mutex<LepTess>>>>,
}

impl OcrInstanceManager {
    /// Create an empty instance pool
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create an OCR instance for the given configuration
    ///
    /// # Errors
    ///
    /// Returns error if Tesseract instance creation fails (e.g., missing language data)
    pub fn get_instance(&self, config: &OcrConfig) -> anyhow::Result<Arc<Mutex<LepTess>>> {
        let key = Self::instance_key(config);

        if let Some(instance) = self.instances.lock().get(&key) {
            return Ok(Arc::clone(instance));
        }

        info!(
            languages = %config.languages,
            tessdata = ?config.tessdata_path,
            "Creating new OCR instance"
        );

        let mut tess = LepTess::new(config.tessdata_path.as_deref(), &config.languages)
            .map_err(|e| anyhow::anyhow!("Failed to initialize Tesseract OCR instance: {}", e))?;

        tess.set_variable(
            leptess::Variable::TesseditPagesegMode,
            config.psm_mode.as_str(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to set PSM mode: {}", e))?;

        let instance = Arc::new(Mutex::new(tess));

        // Another caller may have raced us; keep whichever landed first
        let mut instances = self.instances.lock();
        let stored = instances.entry(key).or_insert_with(|| Arc::clone(&instance));
        Ok(Arc::clone(stored))
    }

    /// Get the number of cached instances
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }

    fn instance_key(config: &OcrConfig) -> String {
        format!(
            "{}:{}",
            config.languages,
            config.tessdata_path.as_deref().unwrap_or("default")
        )
    }
}

impl Default for OcrInstanceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manager_is_empty() {
        assert_eq!(OcrInstanceManager::new().instance_count(), 0);
    }

    #[test]
    fn test_instance_key_includes_tessdata() {
        let mut config = OcrConfig::default();
        assert_eq!(OcrInstanceManager::instance_key(&config), "eng:default");
        config.tessdata_path = Some("/usr/share/tessdata".to_string());
        assert_eq!(
            OcrInstanceManager::instance_key(&config),
            "eng:/usr/share/tessdata"
        );
    }
}
