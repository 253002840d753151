//! # Food Interactions
//!
//! Static table of foods to avoid per drug, used to ground the advice prompt.
//! Loaded once at startup like the drug catalog; lookups are case-insensitive.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};

pub const INTERACTIONS_PATH_ENV: &str = "DRUG_INTERACTIONS_PATH";

pub const INTERACTIONS_FALLBACK_PATHS: [&str; 3] = [
    "/app/config/drug_food_interactions.json",
    "config/drug_food_interactions.json",
    "../config/drug_food_interactions.json",
];

/// Returned for drugs the table does not know
pub const NO_KNOWN_INTERACTIONS: &str = "No known food interactions.";

#[derive(Debug, Deserialize)]
struct InteractionEntry {
    name: String,
    food_interactions: Vec<String>,
}

/// Drug name (lowercased) to foods-to-avoid
#[derive(Debug, Clone, Default)]
pub struct FoodInteractions {
    by_drug: HashMap<String, Vec<String>>,
}

impl FoodInteractions {
    /// Parse the interactions JSON: an array of `{name, food_interactions}`
    ///
    /// Later entries with the same name replace earlier ones.
    pub fn from_json_str(content: &str) -> AppResult<Self> {
        let entries: Vec<InteractionEntry> = serde_json::from_str(content).map_err(|e| {
            AppError::Config(format!("food interactions file is malformed: {}", e))
        })?;

        let mut by_drug = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            let key = entry.name.trim().to_lowercase();
            if key.is_empty() {
                return Err(AppError::Config(format!(
                    "food interactions[{}] 'name' cannot be empty",
                    i
                )));
            }
            by_drug.insert(key, entry.food_interactions);
        }

        Ok(Self { by_drug })
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "failed to read food interactions '{}': {}",
                path.display(),
                e
            ))
        })?;
        let table = Self::from_json_str(&content)?;
        info!(
            path = %path.display(),
            drugs = table.len(),
            "Food interactions loaded"
        );
        Ok(table)
    }

    /// Resolve the interactions file and load it
    pub fn load(explicit_path: Option<&str>) -> AppResult<Self> {
        if let Some(path) = explicit_path {
            return Self::load_from_path(path);
        }

        for candidate in INTERACTIONS_FALLBACK_PATHS {
            if Path::new(candidate).is_file() {
                return Self::load_from_path(candidate);
            }
        }

        warn!("No food interactions file found in any expected location");
        Err(AppError::Config(format!(
            "food interactions not found; set {} or provide one of {:?}",
            INTERACTIONS_PATH_ENV, INTERACTIONS_FALLBACK_PATHS
        )))
    }

    /// Foods to avoid for a drug, or the single "no known interactions" line
    ///
    /// ```rust
    /// use medication_victory_plan::interactions::FoodInteractions;
    ///
    /// let table = FoodInteractions::from_json_str(
    ///     r#"[{"name": "Warfarin", "food_interactions": ["Kale", "Spinach"]}]"#,
    /// ).unwrap();
    /// assert_eq!(table.get("WARFARIN"), vec!["Kale", "Spinach"]);
    /// assert_eq!(table.get("aspirin"), vec!["No known food interactions."]);
    /// ```
    pub fn get(&self, drug_name: &str) -> Vec<String> {
        match self.by_drug.get(&drug_name.trim().to_lowercase()) {
            Some(foods) => foods.clone(),
            None => {
                debug!(drug = %drug_name, "No food interactions on record");
                vec![NO_KNOWN_INTERACTIONS.to_string()]
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_drug.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_drug.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"[
        {"name": "Metformin", "food_interactions": ["Alcohol"]},
        {"name": "Warfarin", "food_interactions": ["Kale", "Grapefruit juice"]}
    ]"#;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = FoodInteractions::from_json_str(SAMPLE).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("metformin"), vec!["Alcohol"]);
        assert_eq!(table.get(" WarFarin "), vec!["Kale", "Grapefruit juice"]);
    }

    #[test]
    fn test_unknown_drug_gets_default_line() {
        let table = FoodInteractions::from_json_str(SAMPLE).unwrap();
        assert_eq!(table.get("ibuprofen"), vec![NO_KNOWN_INTERACTIONS]);
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(FoodInteractions::from_json_str("{}").is_err());
        assert!(FoodInteractions::from_json_str(r#"[{"name": "x"}]"#).is_err());
        assert!(
            FoodInteractions::from_json_str(r#"[{"name": " ", "food_interactions": []}]"#)
                .is_err()
        );
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let path = file.path().to_string_lossy().to_string();
        let table = FoodInteractions::load(Some(&path)).unwrap();
        assert_eq!(table.get("metformin"), vec!["Alcohol"]);
    }

    #[test]
    fn test_missing_explicit_path_is_config_error() {
        let err = FoodInteractions::load(Some("/nonexistent/interactions.json")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
