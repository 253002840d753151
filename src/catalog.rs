//! # Drug Catalog
//!
//! The static reference list of known `{name, dose}` pairs. It is loaded once
//! at startup, validated as a whole, and then shared read-only (behind an
//! `Arc`) with every matcher call. A catalog that fails to load stops the
//! process: there is no partially loaded state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};

/// Environment variable pointing at the catalog JSON file
pub const CATALOG_PATH_ENV: &str = "DRUG_CATALOG_PATH";

/// Paths tried in order when the environment variable is not set
pub const CATALOG_FALLBACK_PATHS: [&str; 3] = [
    "/app/config/drug_list.json", // Docker path
    "config/drug_list.json",      // Local development path
    "../config/drug_list.json",   // Test path
];

/// One reference entry of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugEntry {
    pub name: String,
    pub dose: String,
}

/// Raw shape accepted from JSON; fields are optional so that a missing
/// field is reported with its index instead of a generic serde error.
#[derive(Debug, Deserialize)]
struct RawEntry {
    name: Option<String>,
    dose: Option<String>,
}

/// Immutable, ordered list of reference entries
///
/// Order matters: the matcher breaks score ties in favour of the entry that
/// appears first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugCatalog {
    entries: Vec<DrugEntry>,
}

impl DrugCatalog {
    /// Build a catalog from already-parsed entries, enforcing the same rules as
    /// the JSON loader.
    pub fn new(entries: Vec<DrugEntry>) -> AppResult<Self> {
        if entries.is_empty() {
            return Err(AppError::Config("drug catalog cannot be empty".to_string()));
        }
        for (i, entry) in entries.iter().enumerate() {
            validate_field(i, "name", &entry.name)?;
            validate_field(i, "dose", &entry.dose)?;
        }
        Ok(Self { entries })
    }

    /// Parse and validate a catalog from its JSON text
    ///
    /// # Examples
    ///
    /// ```rust
    /// use medication_victory_plan::catalog::DrugCatalog;
    ///
    /// let catalog = DrugCatalog::from_json_str(
    ///     r#"[{"name": "Metformin", "dose": "500mg"}]"#,
    /// ).unwrap();
    /// assert_eq!(catalog.len(), 1);
    ///
    /// assert!(DrugCatalog::from_json_str(r#"[{"name": "Metformin"}]"#).is_err());
    /// ```
    pub fn from_json_str(content: &str) -> AppResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| AppError::Config(format!("drug catalog is not valid JSON: {}", e)))?;

        if !value.is_array() {
            return Err(AppError::Config(
                "drug catalog must be a JSON array of {name, dose} objects".to_string(),
            ));
        }

        let raw: Vec<RawEntry> = serde_json::from_value(value)
            .map_err(|e| AppError::Config(format!("drug catalog entry is malformed: {}", e)))?;

        let mut entries = Vec::with_capacity(raw.len());
        for (i, item) in raw.into_iter().enumerate() {
            let name = item
                .name
                .ok_or_else(|| AppError::Config(format!("drug catalog[{}] is missing 'name'", i)))?;
            let dose = item
                .dose
                .ok_or_else(|| AppError::Config(format!("drug catalog[{}] is missing 'dose'", i)))?;
            entries.push(DrugEntry { name, dose });
        }

        Self::new(entries)
    }

    /// Load and validate a catalog from a file
    pub fn load_from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "failed to read drug catalog '{}': {}",
                path.display(),
                e
            ))
        })?;
        let catalog = Self::from_json_str(&content)?;
        info!(
            path = %path.display(),
            entries = catalog.len(),
            "Drug catalog loaded"
        );
        Ok(catalog)
    }

    /// Resolve the catalog location and load it
    ///
    /// An explicit path (from configuration) is authoritative: if it cannot be
    /// loaded the error is returned without trying the fallback paths.
    pub fn load(explicit_path: Option<&str>) -> AppResult<Self> {
        if let Some(path) = explicit_path {
            return Self::load_from_path(path);
        }

        for candidate in CATALOG_FALLBACK_PATHS {
            if Path::new(candidate).is_file() {
                return Self::load_from_path(candidate);
            }
        }

        warn!("No drug catalog file found in any expected location");
        Err(AppError::Config(format!(
            "drug catalog not found; set {} or provide one of {:?}",
            CATALOG_PATH_ENV, CATALOG_FALLBACK_PATHS
        )))
    }

    /// Entries in catalog order
    pub fn entries(&self) -> &[DrugEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_field(index: usize, field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Config(format!(
            "drug catalog[{}] '{}' cannot be empty",
            index, field
        )));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(AppError::Config(format!(
            "drug catalog[{}] '{}' contains control characters",
            index, field
        )));
    }
    Ok(())
}
