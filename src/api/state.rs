use sqlx::SqlitePool;
use std::sync::Arc;

use crate::advice::AdvicePlanner;
use crate::drug_matcher::DrugMatcher;
use crate::ocr::TextExtractor;
use crate::sentiment::SentimentClassifier;

/// Shared application state handed to every handler
///
/// Collaborators sit behind traits so tests can swap in canned responses.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub matcher: Arc<DrugMatcher>,
    pub extractor: Arc<dyn TextExtractor>,
    pub advice: Arc<AdvicePlanner>,
    pub sentiment: Arc<dyn SentimentClassifier>,
}
