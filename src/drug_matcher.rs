//! # Drug Matcher
//!
//! Finds the catalog entry that best matches raw OCR text from a label.
//!
//! For every entry, in catalog order:
//! - if the lowercased name occurs verbatim in the lowercased text the entry
//!   scores 100;
//! - otherwise it scores the partial ratio of text against name.
//!
//! The whole catalog is always scanned. An entry only replaces the current
//! best when its score is strictly higher and reaches the threshold, so ties
//! go to the entry listed first.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::catalog::DrugCatalog;
use crate::fuzzy::partial_ratio;

/// Threshold used when none is configured
pub const DEFAULT_MIN_SCORE: u8 = 70;

/// Best catalog match for a piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub name: String,
    pub dose: String,
    /// `score / 100`, rounded to two decimals
    pub confidence: f64,
}

/// Matcher over an immutable, shared catalog
#[derive(Debug, Clone)]
pub struct DrugMatcher {
    catalog: Arc<DrugCatalog>,
    min_score: u8,
}

impl DrugMatcher {
    /// Create a matcher with the default threshold
    pub fn new(catalog: Arc<DrugCatalog>) -> Self {
        Self::with_min_score(catalog, DEFAULT_MIN_SCORE)
    }

    /// Create a matcher with a custom default threshold (clamped to 100)
    pub fn with_min_score(catalog: Arc<DrugCatalog>, min_score: u8) -> Self {
        Self {
            catalog,
            min_score: min_score.min(100),
        }
    }

    pub fn min_score(&self) -> u8 {
        self.min_score
    }

    pub fn catalog(&self) -> &DrugCatalog {
        &self.catalog
    }

    /// Match using the configured threshold
    pub fn match_text(&self, raw_text: &str) -> Option<MatchResult> {
        self.match_with_threshold(raw_text, self.min_score)
    }

    /// Match using an explicit threshold in `0..=100`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use medication_victory_plan::catalog::DrugCatalog;
    /// use medication_victory_plan::drug_matcher::DrugMatcher;
    ///
    /// let catalog = DrugCatalog::from_json_str(
    ///     r#"[{"name": "Metformin", "dose": "500mg"}, {"name": "Metoprolol", "dose": "50mg"}]"#,
    /// ).unwrap();
    /// let matcher = DrugMatcher::new(Arc::new(catalog));
    ///
    /// let found = matcher.match_with_threshold("Take METFORMIN 500mg twice daily", 75).unwrap();
    /// assert_eq!(found.name, "Metformin");
    /// assert_eq!(found.confidence, 1.0);
    ///
    /// assert!(matcher.match_with_threshold("   ", 0).is_none());
    /// ```
    pub fn match_with_threshold(&self, raw_text: &str, min_score: u8) -> Option<MatchResult> {
        if raw_text.trim().is_empty() {
            return None;
        }

        let normalized = raw_text.to_lowercase();
        let mut best: Option<(usize, u8)> = None;

        for (index, entry) in self.catalog.entries().iter().enumerate() {
            let name = entry.name.to_lowercase();

            let score = if normalized.contains(&name) {
                100
            } else {
                partial_ratio(&normalized, &name)
            };
            trace!(drug = %entry.name, score, "Scored catalog entry");

            let best_score = best.map_or(0, |(_, s)| s);
            if score > best_score && score >= min_score {
                best = Some((index, score));
            }
        }

        let (index, score) = best?;
        let entry = &self.catalog.entries()[index];
        debug!(drug = %entry.name, score, min_score, "Drug matched");

        Some(MatchResult {
            name: entry.name.clone(),
            dose: entry.dose.clone(),
            confidence: round_confidence(score),
        })
    }
}

// Scores are whole numbers, so dividing by 100 already yields two decimals
fn round_confidence(score: u8) -> f64 {
    f64::from(score) / 100.0
}
