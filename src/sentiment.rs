//! # Feedback Sentiment
//!
//! Classifies patient feedback into one of five labels using a hosted
//! text-classification model (Hugging Face inference API shape).
//!
//! The model emits `LABEL_0` .. `LABEL_4`, ordered from very negative to
//! very positive. Some deployments return the label names directly, so both
//! spellings are accepted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::SentimentConfig;
use crate::errors::{AppError, AppResult};
use crate::observability::metrics;
use crate::upstream::{build_http_client, JsonPost};

/// Five-point sentiment scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    VeryNegative,
    Negative,
    Neutral,
    Positive,
    VeryPositive,
}

impl Sentiment {
    /// All labels in model index order
    pub const ALL: [Sentiment; 5] = [
        Sentiment::VeryNegative,
        Sentiment::Negative,
        Sentiment::Neutral,
        Sentiment::Positive,
        Sentiment::VeryPositive,
    ];

    /// Label for a model class index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::VeryNegative => "very_negative",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
            Sentiment::VeryPositive => "very_positive",
        }
    }

    /// Parse a model output label
    ///
    /// ```rust
    /// use medication_victory_plan::sentiment::Sentiment;
    ///
    /// assert_eq!(Sentiment::from_model_label("LABEL_4"), Some(Sentiment::VeryPositive));
    /// assert_eq!(Sentiment::from_model_label("Very Negative"), Some(Sentiment::VeryNegative));
    /// assert_eq!(Sentiment::from_model_label("LABEL_9"), None);
    /// ```
    pub fn from_model_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        if let Some(index) = normalized.strip_prefix("label_") {
            return index.parse().ok().and_then(Self::from_index);
        }
        normalized.parse().ok()
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("unknown sentiment label '{}'", s)))
    }
}

/// Classifies feedback text
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> AppResult<Sentiment>;
}

/// Cut text to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Pick the highest-scoring label from an inference response
///
/// Accepts both `[[{label, score}, ...]]` and `[{label, score}, ...]`.
pub fn parse_inference_response(value: Value) -> AppResult<Sentiment> {
    let candidates: Vec<LabelScore> = match value {
        Value::Array(outer) if matches!(outer.first(), Some(Value::Array(_))) => {
            match outer.into_iter().next() {
                Some(inner) => serde_json::from_value(inner),
                None => Ok(Vec::new()),
            }
        }
        other => serde_json::from_value(other),
    }
    .map_err(|e| AppError::Upstream(format!("unexpected sentiment response shape: {}", e)))?;

    let best = candidates
        .into_iter()
        .filter(|c| c.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| AppError::Upstream("sentiment response contained no labels".to_string()))?;

    Sentiment::from_model_label(&best.label).ok_or_else(|| {
        AppError::Upstream(format!("sentiment model returned unknown label '{}'", best.label))
    })
}

/// Classifier backed by a hosted inference endpoint
pub struct HostedSentimentClassifier {
    client: reqwest::Client,
    config: SentimentConfig,
    endpoint: String,
    breaker: CircuitBreaker,
}

impl HostedSentimentClassifier {
    pub fn new(config: SentimentConfig) -> AppResult<Self> {
        let client = build_http_client(config.http_timeout_secs)?;
        let endpoint = config.model_url();
        let breaker = CircuitBreaker::new("sentiment", config.recovery.clone());
        Ok(Self {
            client,
            config,
            endpoint,
            breaker,
        })
    }
}

#[async_trait]
impl SentimentClassifier for HostedSentimentClassifier {
    async fn classify(&self, text: &str) -> AppResult<Sentiment> {
        let input = truncate_chars(text, self.config.max_input_chars);
        debug!(
            chars = input.chars().count(),
            truncated = input.len() < text.len(),
            "Classifying feedback"
        );

        let payload = json!({ "inputs": input });
        let response = JsonPost {
            client: &self.client,
            url: &self.endpoint,
            bearer_token: self.config.api_token.as_deref(),
            payload: &payload,
            breaker: &self.breaker,
            recovery: &self.config.recovery,
        }
        .send()
        .await?;

        let sentiment = parse_inference_response(response)?;
        metrics::record_sentiment_label(sentiment.as_str());
        info!(sentiment = %sentiment, "Feedback classified");
        Ok(sentiment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_order() {
        let labels: Vec<&str> = Sentiment::ALL.iter().map(Sentiment::as_str).collect();
        assert_eq!(
            labels,
            vec!["very_negative", "negative", "neutral", "positive", "very_positive"]
        );
        assert_eq!(Sentiment::from_index(2), Some(Sentiment::Neutral));
        assert_eq!(Sentiment::from_index(5), None);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Sentiment::VeryPositive).unwrap(),
            "\"very_positive\""
        );
        let parsed: Sentiment = serde_json::from_str("\"negative\"").unwrap();
        assert_eq!(parsed, Sentiment::Negative);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert_eq!("neutral".parse::<Sentiment>().unwrap(), Sentiment::Neutral);
        assert!("meh".parse::<Sentiment>().is_err());
    }

    #[test]
    fn test_parse_nested_response() {
        let response = json!([[
            {"label": "LABEL_1", "score": 0.10},
            {"label": "LABEL_3", "score": 0.85},
            {"label": "LABEL_2", "score": 0.05}
        ]]);
        assert_eq!(parse_inference_response(response).unwrap(), Sentiment::Positive);
    }

    #[test]
    fn test_parse_flat_response_with_names() {
        let response = json!([
            {"label": "very_negative", "score": 0.7},
            {"label": "neutral", "score": 0.3}
        ]);
        assert_eq!(
            parse_inference_response(response).unwrap(),
            Sentiment::VeryNegative
        );
    }

    #[test]
    fn test_parse_rejects_bad_responses() {
        assert!(parse_inference_response(json!([])).is_err());
        assert!(parse_inference_response(json!([[]])).is_err());
        assert!(parse_inference_response(json!({"error": "model loading"})).is_err());
        assert!(parse_inference_response(json!([{"label": "LABEL_7", "score": 1.0}])).is_err());
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
