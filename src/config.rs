//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all application settings into a single, structured configuration object.
//! It supports loading from environment variables, validation, and provides
//! a clean interface for accessing configuration throughout the application.

use crate::drug_matcher::DEFAULT_MIN_SCORE;
use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::OcrConfig;
use crate::recovery::RecoveryConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://mvp.sqlite3?mode=rwc";
pub const DEFAULT_GROQ_API_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_SENTIMENT_API_URL: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_SENTIMENT_MODEL: &str =
    "AventIQ-AI/sentiment-analysis-for-patient-reviews-analysis";

/// Read an optional variable, treating blank values as unset
fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a variable, falling back to `default` when unset
fn env_parse<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a valid number", key))),
        None => Ok(default),
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// API port
    pub port: u16,
    /// Maximum accepted request body (label uploads included)
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.host.trim().is_empty() {
            return Err(AppError::Config("HOST cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(AppError::Config("PORT cannot be 0".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(AppError::Config(
                "MAX_UPLOAD_BYTES must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` string for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection acquire timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            connect_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Validate database configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.url.trim().is_empty() {
            return Err(AppError::Config("Database URL cannot be empty".to_string()));
        }

        if !self.url.starts_with("sqlite:") {
            return Err(AppError::Config(
                "Database URL must start with 'sqlite:'".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(AppError::Config("Max connections cannot be 0".to_string()));
        }

        if self.max_connections > 100 {
            return Err(AppError::Config(
                "Max connections cannot be greater than 100".to_string(),
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(AppError::Config("Connect timeout cannot be 0".to_string()));
        }

        Ok(())
    }
}

/// Drug matcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Explicit catalog path; fallbacks are searched when unset
    pub catalog_path: Option<String>,
    /// Default acceptance threshold (0-100)
    pub min_score: u8,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.min_score > 100 {
            return Err(AppError::Config(format!(
                "MATCH_MIN_SCORE ({}) must be between 0 and 100",
                self.min_score
            )));
        }
        Ok(())
    }
}

/// Advice generation (hosted LLM) configuration
#[derive(Debug, Clone)]
pub struct AdviceConfig {
    /// Groq API key
    pub api_key: String,
    /// OpenAI-compatible base URL
    pub api_url: String,
    /// Chat model name
    pub model: String,
    /// Explicit food interactions path; fallbacks are searched when unset
    pub interactions_path: Option<String>,
    /// HTTP client timeout in seconds
    pub http_timeout_secs: u64,
    /// Retry and circuit breaker settings
    pub recovery: RecoveryConfig,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_GROQ_API_URL.to_string(),
            model: DEFAULT_GROQ_MODEL.to_string(),
            interactions_path: None,
            http_timeout_secs: 30,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl AdviceConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::Config("GROQ_API_KEY cannot be empty".to_string()));
        }
        validate_http_url("GROQ_API_URL", &self.api_url)?;
        if self.model.trim().is_empty() {
            return Err(AppError::Config("GROQ_MODEL cannot be empty".to_string()));
        }
        validate_timeout(self.http_timeout_secs)?;
        self.recovery.validate()
    }

    /// Full chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }
}

/// Sentiment inference configuration
#[derive(Debug, Clone)]
pub struct SentimentConfig {
    /// Inference API base URL
    pub api_url: String,
    /// Optional bearer token
    pub api_token: Option<String>,
    /// Model identifier appended to the base URL
    pub model: String,
    /// Feedback is cut to this many characters before inference
    pub max_input_chars: usize,
    /// HTTP client timeout in seconds
    pub http_timeout_secs: u64,
    /// Retry and circuit breaker settings
    pub recovery: RecoveryConfig,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_SENTIMENT_API_URL.to_string(),
            api_token: None,
            model: DEFAULT_SENTIMENT_MODEL.to_string(),
            max_input_chars: 512,
            http_timeout_secs: 30,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl SentimentConfig {
    pub fn validate(&self) -> AppResult<()> {
        validate_http_url("SENTIMENT_API_URL", &self.api_url)?;
        if self.model.trim().is_empty() {
            return Err(AppError::Config("SENTIMENT_MODEL cannot be empty".to_string()));
        }
        if self.max_input_chars == 0 {
            return Err(AppError::Config(
                "sentiment max_input_chars must be greater than 0".to_string(),
            ));
        }
        validate_timeout(self.http_timeout_secs)?;
        self.recovery.validate()
    }

    /// Full inference endpoint for the configured model
    pub fn model_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            self.model.trim_start_matches('/')
        )
    }
}

fn validate_http_url(key: &str, url: &str) -> AppResult<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AppError::Config(format!(
            "{} must start with 'http://' or 'https://'",
            key
        )));
    }
    Ok(())
}

fn validate_timeout(secs: u64) -> AppResult<()> {
    if secs == 0 {
        return Err(AppError::Config("HTTP timeout cannot be 0".to_string()));
    }
    if secs > 300 {
        return Err(AppError::Config(
            "HTTP timeout cannot be greater than 300 seconds".to_string(),
        ));
    }
    Ok(())
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub matcher: MatcherConfig,
    pub advice: AdviceConfig,
    pub sentiment: SentimentConfig,
    pub ocr: OcrConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // Server
        if let Some(host) = env_opt("HOST") {
            config.server.host = host;
        }
        config.server.port = env_parse("PORT", config.server.port)?;
        config.server.max_upload_bytes =
            env_parse("MAX_UPLOAD_BYTES", config.server.max_upload_bytes)?;

        // Database
        if let Some(url) = env_opt("DATABASE_URL") {
            config.database.url = url;
        }
        config.database.max_connections =
            env_parse("DATABASE_MAX_CONNECTIONS", config.database.max_connections)?;

        // Matcher
        config.matcher.catalog_path = env_opt(crate::catalog::CATALOG_PATH_ENV);
        config.matcher.min_score = env_parse("MATCH_MIN_SCORE", config.matcher.min_score)?;

        // Advice
        config.advice.api_key = env_opt("GROQ_API_KEY").ok_or_else(|| {
            AppError::Config("GROQ_API_KEY environment variable is required".to_string())
        })?;
        if let Some(url) = env_opt("GROQ_API_URL") {
            config.advice.api_url = url;
        }
        if let Some(model) = env_opt("GROQ_MODEL") {
            config.advice.model = model;
        }
        config.advice.interactions_path = env_opt(crate::interactions::INTERACTIONS_PATH_ENV);
        let http_timeout_secs =
            env_parse("HTTP_CLIENT_TIMEOUT_SECS", config.advice.http_timeout_secs)?;
        config.advice.http_timeout_secs = http_timeout_secs;

        // Sentiment
        if let Some(url) = env_opt("SENTIMENT_API_URL") {
            config.sentiment.api_url = url;
        }
        config.sentiment.api_token = env_opt("SENTIMENT_API_TOKEN");
        if let Some(model) = env_opt("SENTIMENT_MODEL") {
            config.sentiment.model = model;
        }
        config.sentiment.http_timeout_secs = http_timeout_secs;

        // OCR keeps its defaults apart from the PDF render resolution
        config.ocr = OcrConfig::default();
        config.ocr.preprocess.pdf_dpi = env_parse("OCR_PDF_DPI", config.ocr.preprocess.pdf_dpi)?;

        config.observability = ObservabilityConfig::from_env()?;

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.server.validate()?;
        self.database.validate()?;
        self.matcher.validate()?;
        self.advice.validate()?;
        self.sentiment.validate()?;
        self.ocr.validate()?;
        self.observability.validate()?;

        if self.observability.enable_metrics_export
            && self.observability.metrics_port == self.server.port
        {
            return Err(AppError::Config(
                "API port and metrics port cannot be the same".to_string(),
            ));
        }
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: bind={}, db_url={}, groq_api_key=[REDACTED], groq_model={}, sentiment_model={}, sentiment_token={}, match_min_score={}, metrics_port={}, ocr_languages={}",
            self.server.bind_address(),
            self.database.url,
            self.advice.model,
            self.sentiment.model,
            if self.sentiment.api_token.is_some() { "[REDACTED]" } else { "none" },
            self.matcher.min_score,
            self.observability.metrics_port,
            self.ocr.languages,
        )
    }
}
