//! Validation module for request fields
//!
//! Every text field accepted by the HTTP API passes through here before it
//! reaches the advice model, the sentiment model or the database.

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::{AppError, AppResult};

lazy_static! {
    static ref SOURCE_PATTERN: Regex =
        Regex::new(r"^[a-z0-9_-]{1,32}$").expect("Invalid source regex pattern");
}

/// Maximum length (characters) for drug names, doses and frequencies
pub const MAX_FIELD_CHARS: usize = 100;
/// Maximum length (characters) for a med key (`"{name} {dose}"`)
pub const MAX_MED_KEY_CHARS: usize = 201;
/// Maximum length (characters) for feedback text
pub const MAX_FEEDBACK_CHARS: usize = 2000;

/// Validate a required text field and return it trimmed
///
/// # Examples
/// ```
/// use medication_victory_plan::validation::validate_text_field;
///
/// assert_eq!(validate_text_field("name", "  Metformin ", 100).unwrap(), "Metformin");
/// assert!(validate_text_field("name", "   ", 100).is_err());
/// assert!(validate_text_field("name", &"a".repeat(101), 100).is_err());
/// ```
pub fn validate_text_field<'a>(field: &str, value: &'a str, max_chars: usize) -> AppResult<&'a str> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("'{}' cannot be empty", field)));
    }

    if trimmed.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "'{}' is too long (maximum {} characters)",
            field, max_chars
        )));
    }

    if trimmed.chars().any(|c| c.is_control() && c != '\n' && c != '\t') {
        return Err(AppError::Validation(format!(
            "'{}' contains control characters",
            field
        )));
    }

    Ok(trimmed)
}

/// Validate a submission source tag such as `manual`, `web` or `api`
///
/// # Examples
/// ```
/// use medication_victory_plan::validation::validate_source;
///
/// assert!(validate_source("mobile-app").is_ok());
/// assert!(validate_source("Web").is_err());
/// assert!(validate_source("").is_err());
/// ```
pub fn validate_source(source: &str) -> AppResult<&str> {
    if SOURCE_PATTERN.is_match(source) {
        Ok(source)
    } else {
        Err(AppError::Validation(format!(
            "'source' must match [a-z0-9_-] and be 1-32 characters, got '{}'",
            source.chars().take(40).collect::<String>()
        )))
    }
}

/// Build the lowercased med key for a plan
///
/// ```
/// use medication_victory_plan::validation::med_key;
///
/// assert_eq!(med_key("Metformin", "500MG"), "metformin 500mg");
/// ```
pub fn med_key(name: &str, dose: &str) -> String {
    format!("{} {}", name, dose).to_lowercase()
}
