use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::observability::metrics::record_db_metrics;
use crate::sentiment::Sentiment;

/// A generated advice plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRecord {
    pub id: i64,
    pub drug_name: String,
    pub dose: String,
    pub frequency: String,
    pub advice: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// A classified piece of patient feedback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub id: i64,
    pub med_key: String,
    pub feedback_text: String,
    pub sentiment: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// Feedback counts for one medication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MedicationStats {
    pub very_negative: i64,
    pub negative: i64,
    pub neutral: i64,
    pub positive: i64,
    pub very_positive: i64,
    /// Feedback count per submission source
    pub sources: BTreeMap<String, i64>,
}

impl MedicationStats {
    fn add(&mut self, sentiment: Sentiment, count: i64) {
        let slot = match sentiment {
            Sentiment::VeryNegative => &mut self.very_negative,
            Sentiment::Negative => &mut self.negative,
            Sentiment::Neutral => &mut self.neutral,
            Sentiment::Positive => &mut self.positive,
            Sentiment::VeryPositive => &mut self.very_positive,
        };
        *slot += count;
    }

    /// Total number of feedback rows counted
    pub fn total(&self) -> i64 {
        self.very_negative + self.negative + self.neutral + self.positive + self.very_positive
    }
}

/// Dashboard: med key to its feedback counts
pub type DashboardStats = BTreeMap<String, MedicationStats>;

/// Open the SQLite pool described by the configuration
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .context("Invalid DATABASE_URL")?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    info!(max_connections = config.max_connections, "Database pool created");
    Ok(pool)
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS plans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            drug_name TEXT NOT NULL,
            dose TEXT NOT NULL,
            frequency TEXT NOT NULL,
            advice TEXT NOT NULL,
            source TEXT NOT NULL,
            timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create plans table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            med_key TEXT NOT NULL,
            feedback_text TEXT NOT NULL,
            sentiment TEXT NOT NULL,
            source TEXT NOT NULL,
            timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create feedback table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS feedback_med_key_idx ON feedback(med_key)")
        .execute(pool)
        .await
        .context("Failed to create feedback med_key index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Store a generated plan; the drug name is stored lowercased
pub async fn save_plan(
    pool: &SqlitePool,
    drug_name: &str,
    dose: &str,
    frequency: &str,
    advice: &str,
    source: &str,
) -> Result<i64> {
    let start = Instant::now();
    let drug_name = drug_name.to_lowercase();
    debug!(drug_name = %drug_name, source = %source, "Saving plan");

    let row = sqlx::query(
        "INSERT INTO plans (drug_name, dose, frequency, advice, source) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&drug_name)
    .bind(dose)
    .bind(frequency)
    .bind(advice)
    .bind(source)
    .fetch_one(pool)
    .await
    .context("Failed to insert plan")?;

    let plan_id: i64 = row.get(0);
    record_db_metrics("save_plan", start.elapsed());
    debug!(plan_id = %plan_id, "Plan saved successfully");

    Ok(plan_id)
}

/// Store classified feedback; the med key is stored lowercased
pub async fn save_feedback(
    pool: &SqlitePool,
    med_key: &str,
    feedback_text: &str,
    sentiment: Sentiment,
    source: &str,
) -> Result<i64> {
    let start = Instant::now();
    let med_key = med_key.to_lowercase();
    debug!(med_key = %med_key, sentiment = %sentiment, "Saving feedback");

    let row = sqlx::query(
        "INSERT INTO feedback (med_key, feedback_text, sentiment, source) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(&med_key)
    .bind(feedback_text)
    .bind(sentiment.as_str())
    .bind(source)
    .fetch_one(pool)
    .await
    .context("Failed to insert feedback")?;

    let feedback_id: i64 = row.get(0);
    record_db_metrics("save_feedback", start.elapsed());
    debug!(feedback_id = %feedback_id, "Feedback saved successfully");

    Ok(feedback_id)
}

/// Aggregate all feedback by medication, sentiment and source
///
/// Rows carrying a sentiment outside the five known labels still count
/// towards their source but are otherwise skipped.
pub async fn get_dashboard_stats(pool: &SqlitePool) -> Result<DashboardStats> {
    let start = Instant::now();

    let rows = sqlx::query(
        "SELECT med_key, sentiment, source, COUNT(*) AS total
         FROM feedback
         GROUP BY med_key, sentiment, source",
    )
    .fetch_all(pool)
    .await
    .context("Failed to aggregate feedback")?;

    let mut stats = DashboardStats::new();
    for row in rows {
        let med_key: String = row.get("med_key");
        let sentiment: String = row.get("sentiment");
        let source: String = row.get("source");
        let count: i64 = row.get("total");

        let entry = stats.entry(med_key).or_default();
        match sentiment.parse::<Sentiment>() {
            Ok(sentiment) => entry.add(sentiment, count),
            Err(_) => warn!(sentiment = %sentiment, "Skipping unknown sentiment label in dashboard"),
        }
        *entry.sources.entry(source).or_insert(0) += count;
    }

    record_db_metrics("get_dashboard_stats", start.elapsed());
    debug!(medications = stats.len(), "Dashboard stats aggregated");
    Ok(stats)
}

/// Read a plan from the database by ID
pub async fn read_plan(pool: &SqlitePool, plan_id: i64) -> Result<Option<PlanRecord>> {
    debug!(plan_id = %plan_id, "Reading plan");

    let row = sqlx::query(
        "SELECT id, drug_name, dose, frequency, advice, source, timestamp FROM plans WHERE id = ?",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read plan")?;

    match row {
        Some(row) => Ok(Some(PlanRecord {
            id: row.get("id"),
            drug_name: row.get("drug_name"),
            dose: row.get("dose"),
            frequency: row.get("frequency"),
            advice: row.get("advice"),
            source: row.get("source"),
            timestamp: read_timestamp(&row)?,
        })),
        None => {
            debug!(plan_id = %plan_id, "Plan not found");
            Ok(None)
        }
    }
}

/// List feedback for one medication, oldest first
pub async fn list_feedback(pool: &SqlitePool, med_key: &str) -> Result<Vec<FeedbackRecord>> {
    let med_key = med_key.to_lowercase();
    debug!(med_key = %med_key, "Listing feedback");

    let rows = sqlx::query(
        "SELECT id, med_key, feedback_text, sentiment, source, timestamp
         FROM feedback WHERE med_key = ? ORDER BY id",
    )
    .bind(&med_key)
    .fetch_all(pool)
    .await
    .context("Failed to list feedback")?;

    rows.iter()
        .map(|row| {
            Ok(FeedbackRecord {
                id: row.get("id"),
                med_key: row.get("med_key"),
                feedback_text: row.get("feedback_text"),
                sentiment: row.get("sentiment"),
                source: row.get("source"),
                timestamp: read_timestamp(row)?,
            })
        })
        .collect()
}

// CURRENT_TIMESTAMP is stored as naive UTC text
fn read_timestamp(row: &sqlx::sqlite::SqliteRow) -> Result<DateTime<Utc>> {
    let naive: chrono::NaiveDateTime = row
        .try_get("timestamp")
        .context("Failed to decode timestamp")?;
    Ok(naive.and_utc())
}
