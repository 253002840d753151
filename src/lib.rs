//! # Medication Victory Plan
//!
//! A medication-safety service: it reads a drug name and dose from a
//! photographed label, fuzzy-matches it against a reference catalog, asks a
//! hosted language model for food-timing advice, and records patient feedback
//! with a sentiment label for dashboarding.

pub mod advice;
pub mod api;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod drug_matcher;
pub mod errors;
pub mod fuzzy;
pub mod instance_manager;
pub mod interactions;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod preprocessing;
pub mod recovery;
pub mod sentiment;
pub mod upstream;
pub mod validation;

// Re-export types for easier access
pub use catalog::{DrugCatalog, DrugEntry};
pub use drug_matcher::{DrugMatcher, MatchResult};
pub use errors::{AppError, AppResult};
