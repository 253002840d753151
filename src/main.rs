use anyhow::{Context, Result};
use medication_victory_plan::advice::{AdvicePlanner, GroqChatModel};
use medication_victory_plan::api::{build_router, AppState};
use medication_victory_plan::catalog::DrugCatalog;
use medication_victory_plan::config::AppConfig;
use medication_victory_plan::db;
use medication_victory_plan::drug_matcher::DrugMatcher;
use medication_victory_plan::errors::error_logging;
use medication_victory_plan::interactions::FoodInteractions;
use medication_victory_plan::observability;
use medication_victory_plan::observability::metrics::record_startup_metrics;
use medication_victory_plan::observability_config::ObservabilityConfig;
use medication_victory_plan::ocr::TesseractExtractor;
use medication_victory_plan::sentiment::HostedSentimentClassifier;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::info;

/// Load and validate configuration, logging the failing key before exiting
fn load_configuration() -> Result<AppConfig> {
    let config = AppConfig::from_env().map_err(|e| {
        error_logging::log_config_error(&e, "environment", "load_configuration");
        anyhow::anyhow!("{}", e)
    })?;

    config.validate().map_err(|e| {
        error_logging::log_config_error(&e, "environment", "validate_configuration");
        anyhow::anyhow!("Configuration validation failed: {}", e)
    })?;

    info!("{}", config.summary());
    Ok(config)
}

/// Load the drug catalog and the food interactions table
fn load_reference_data(config: &AppConfig) -> Result<(Arc<DrugCatalog>, Arc<FoodInteractions>)> {
    let catalog = DrugCatalog::load(config.matcher.catalog_path.as_deref()).map_err(|e| {
        error_logging::log_config_error(&e, "DRUG_CATALOG_PATH", "load_catalog");
        anyhow::anyhow!("{}", e)
    })?;

    let interactions =
        FoodInteractions::load(config.advice.interactions_path.as_deref()).map_err(|e| {
            error_logging::log_config_error(&e, "DRUG_INTERACTIONS_PATH", "load_interactions");
            anyhow::anyhow!("{}", e)
        })?;

    Ok((Arc::new(catalog), Arc::new(interactions)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let startup = Instant::now();

    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    // Logging comes up before anything else can fail
    let observability_config = ObservabilityConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;
    observability::init_tracing(&observability_config)?;

    let config = load_configuration()?;
    let (catalog, interactions) = load_reference_data(&config)?;

    let pool = db::connect(&config.database).await?;
    db::init_database_schema(&pool).await?;

    observability::init_metrics(&config.observability, Some(pool.clone()))
        .await
        .context("Failed to start metrics server")?;

    let matcher = Arc::new(DrugMatcher::with_min_score(
        catalog,
        config.matcher.min_score,
    ));
    let chat_model = Arc::new(GroqChatModel::new(config.advice.clone())?);
    let state = AppState {
        pool,
        matcher,
        extractor: Arc::new(TesseractExtractor::new(config.ocr.clone())),
        advice: Arc::new(AdvicePlanner::new(chat_model, interactions)),
        sentiment: Arc::new(HostedSentimentClassifier::new(config.sentiment.clone())?),
    };

    let app = build_router(state, config.server.max_upload_bytes);
    let bind_address = config.server.bind_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    record_startup_metrics(startup.elapsed());
    info!(address = %bind_address, "Medication Victory Plan API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    info!("Server stopped");
    Ok(())
}
