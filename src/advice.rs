//! # Food-Timing Advice
//!
//! Builds the coaching prompt for a medication (grounded on the food
//! interactions table) and sends it to a hosted chat model.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::AdviceConfig;
use crate::errors::{AppError, AppResult};
use crate::interactions::FoodInteractions;
use crate::upstream::{build_http_client, JsonPost};

/// Closing line every plan must end with
pub const SIGN_OFF: &str = "Stay safe. MVp has your back.";

/// A hosted chat model that turns a prompt into text
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> AppResult<String>;
}

/// Render the coaching prompt
///
/// ```rust
/// use medication_victory_plan::advice::build_prompt;
///
/// let prompt = build_prompt("Warfarin", "5mg", "once daily", &["Kale".to_string()]);
/// assert!(prompt.contains("Drug: Warfarin 5mg, once daily"));
/// assert!(prompt.contains("Avoid: Kale"));
/// ```
pub fn build_prompt(drug: &str, dose: &str, frequency: &str, interactions: &[String]) -> String {
    format!(
        "You are MVp, a medication food coach.\n\
         \n\
         Drug: {drug} {dose}, {frequency}\n\
         Avoid: {avoid}\n\
         \n\
         Generate 3-5 bullet points:\n\
         1. Safe time gaps before/after avoided foods\n\
         2. Nutritionally similar SAFE replacements\n\
         3. Simple, clear language\n\
         4. End with: \"{SIGN_OFF}\"\n\
         \n\
         Respond only with bullet points.\n",
        avoid = interactions.join("\n"),
    )
}

/// Generates a food-timing plan for one medication
pub struct AdvicePlanner {
    model: Arc<dyn ChatModel>,
    interactions: Arc<FoodInteractions>,
}

impl AdvicePlanner {
    pub fn new(model: Arc<dyn ChatModel>, interactions: Arc<FoodInteractions>) -> Self {
        Self {
            model,
            interactions,
        }
    }

    /// Ask the model for advice; the reply is trimmed and must not be empty
    pub async fn generate(&self, drug: &str, dose: &str, frequency: &str) -> AppResult<String> {
        let interactions = self.interactions.get(drug);
        let prompt = build_prompt(drug, dose, frequency, &interactions);
        debug!(drug = %drug, interactions = interactions.len(), "Requesting advice");

        let advice = self.model.complete(&prompt).await?;
        let advice = advice.trim();
        if advice.is_empty() {
            return Err(AppError::Upstream(
                "advice model returned an empty response".to_string(),
            ));
        }

        info!(drug = %drug, chars = advice.len(), "Advice generated");
        Ok(advice.to_string())
    }
}

/// Extract the first choice's message content from a chat completion
pub fn parse_chat_completion(value: &Value) -> AppResult<String> {
    value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::Upstream("chat completion response has no message content".to_string())
        })
}

/// OpenAI-compatible chat completions client (Groq by default)
pub struct GroqChatModel {
    client: reqwest::Client,
    config: AdviceConfig,
    endpoint: String,
    breaker: CircuitBreaker,
}

impl GroqChatModel {
    pub fn new(config: AdviceConfig) -> AppResult<Self> {
        let client = build_http_client(config.http_timeout_secs)?;
        let endpoint = config.completions_url();
        let breaker = CircuitBreaker::new("advice", config.recovery.clone());
        Ok(Self {
            client,
            config,
            endpoint,
            breaker,
        })
    }
}

#[async_trait]
impl ChatModel for GroqChatModel {
    async fn complete(&self, prompt: &str) -> AppResult<String> {
        let payload = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = JsonPost {
            client: &self.client,
            url: &self.endpoint,
            bearer_token: Some(&self.config.api_key),
            payload: &payload,
            breaker: &self.breaker,
            recovery: &self.config.recovery,
        }
        .send()
        .await?;

        parse_chat_completion(&response)
    }
}
