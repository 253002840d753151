//! # Test Helper Library
//!
//! Common setup for integration tests: an in-memory database, a small
//! catalog and stand-ins for the OCR engine and the hosted models.

#![allow(dead_code)]

use async_trait::async_trait;
use medication_victory_plan::advice::{AdvicePlanner, ChatModel};
use medication_victory_plan::api::AppState;
use medication_victory_plan::catalog::DrugCatalog;
use medication_victory_plan::db;
use medication_victory_plan::drug_matcher::DrugMatcher;
use medication_victory_plan::errors::{AppError, AppResult};
use medication_victory_plan::interactions::FoodInteractions;
use medication_victory_plan::ocr::TextExtractor;
use medication_victory_plan::ocr_errors::OcrError;
use medication_victory_plan::sentiment::{Sentiment, SentimentClassifier};
use parking_lot::Mutex;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

pub const TWO_DRUG_CATALOG: &str = r#"[
    {"name": "Metformin", "dose": "500mg"},
    {"name": "Metoprolol", "dose": "50mg"}
]"#;

pub const INTERACTIONS: &str = r#"[
    {"name": "Warfarin", "food_interactions": ["Leafy greens", "Cranberry juice"]},
    {"name": "Metformin", "food_interactions": ["Alcohol"]}
]"#;

/// Setup an in-memory database with the schema applied
///
/// A single connection keeps every query on the same in-memory database.
pub async fn setup_test_database() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    db::init_database_schema(&pool).await?;
    Ok(pool)
}

pub fn two_drug_catalog() -> Arc<DrugCatalog> {
    Arc::new(DrugCatalog::from_json_str(TWO_DRUG_CATALOG).expect("valid catalog"))
}

/// Extractor that returns fixed text, or fails like a broken engine
pub struct CannedExtractor {
    text: Option<String>,
}

impl CannedExtractor {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl TextExtractor for CannedExtractor {
    async fn extract_text(&self, _bytes: Vec<u8>, _content_type: &str) -> Result<String, OcrError> {
        self.text
            .clone()
            .ok_or_else(|| OcrError::Extraction("engine crashed".to_string()))
    }
}

/// Chat model that records prompts and replies with fixed text
pub struct RecordingModel {
    reply: AppResult<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(AppError::Upstream(message.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn complete(&self, prompt: &str) -> AppResult<String> {
        self.prompts.lock().push(prompt.to_string());
        self.reply.clone()
    }
}

/// Classifier that always returns the same label
pub struct FixedClassifier(pub Sentiment);

#[async_trait]
impl SentimentClassifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> AppResult<Sentiment> {
        Ok(self.0)
    }
}

/// Build application state around the given collaborators
pub fn test_state(
    pool: SqlitePool,
    extractor: Arc<dyn TextExtractor>,
    model: Arc<dyn ChatModel>,
    sentiment: Sentiment,
) -> AppState {
    let interactions =
        Arc::new(FoodInteractions::from_json_str(INTERACTIONS).expect("valid interactions"));
    AppState {
        pool,
        matcher: Arc::new(DrugMatcher::new(two_drug_catalog())),
        extractor,
        advice: Arc::new(AdvicePlanner::new(model, interactions)),
        sentiment: Arc::new(FixedClassifier(sentiment)),
    }
}
