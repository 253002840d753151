//! # Recovery Configuration Module
//!
//! Retry and circuit breaker settings shared by every external collaborator
//! (Tesseract, the advice LLM and the sentiment model), plus the backoff
//! calculation used between attempts.

use crate::errors::{AppError, AppResult};

/// Recovery configuration for error handling
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of attempts (first try included)
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for a single operation in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 1000,  // 1 second
            max_retry_delay_ms: 10000,  // 10 seconds
            operation_timeout_secs: 30, // 30 seconds
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

impl RecoveryConfig {
    /// Validate recovery configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.max_retries == 0 {
            return Err(AppError::Config(
                "max_retries must be greater than 0".to_string(),
            ));
        }
        if self.base_retry_delay_ms == 0 {
            return Err(AppError::Config(
                "base_retry_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_retry_delay_ms < self.base_retry_delay_ms {
            return Err(AppError::Config(format!(
                "max_retry_delay_ms ({}) must be >= base_retry_delay_ms ({})",
                self.max_retry_delay_ms, self.base_retry_delay_ms
            )));
        }
        if self.operation_timeout_secs == 0 {
            return Err(AppError::Config(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(AppError::Config(
                "circuit_breaker_threshold must be greater than 0".to_string(),
            ));
        }
        if self.circuit_breaker_reset_secs == 0 {
            return Err(AppError::Config(
                "circuit_breaker_reset_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Calculate retry delay with exponential backoff
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay)
/// final_delay = delay + random(0..=delay/4)
/// ```
///
/// | Attempt | Exponential | Final Delay Range |
/// |---------|-------------|-------------------|
/// | 1       | 1000ms      | 1000-1250ms       |
/// | 2       | 2000ms      | 2000-2500ms       |
/// | 3       | 4000ms      | 4000-5000ms       |
/// | 5+      | 10000ms*    | 10000-12500ms     |
///
/// *Capped at max_retry_delay_ms
///
/// # Examples
///
/// ```rust
/// use medication_victory_plan::recovery::{calculate_retry_delay, RecoveryConfig};
///
/// let config = RecoveryConfig::default();
/// let delay = calculate_retry_delay(2, &config);
/// assert!((2000..=2500).contains(&delay));
/// ```
pub fn calculate_retry_delay(attempt: u32, recovery: &RecoveryConfig) -> u64 {
    #[allow(clippy::cast_precision_loss)]
    let base_delay = recovery.base_retry_delay_ms as f64;

    let exponent = attempt.saturating_sub(1).min(32);
    let exponential_delay = base_delay * (2.0_f64).powi(exponent as i32);

    #[allow(clippy::cast_precision_loss)]
    let delay = exponential_delay.min(recovery.max_retry_delay_ms as f64) as u64;

    // Jitter keeps concurrent retries from lining up
    let jitter_cap = delay / 4;
    let jitter = if jitter_cap == 0 {
        0
    } else {
        rand::random::<u64>() % (jitter_cap + 1)
    };
    delay + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(unused_assignments)]
    fn test_recovery_config_validation() {
        let mut config = RecoveryConfig::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        config.max_retries = 0;
        assert!(config.validate().is_err());
        config.max_retries = 3;

        config.base_retry_delay_ms = 0;
        assert!(config.validate().is_err());
        config.base_retry_delay_ms = 1000;

        // max below base
        config.max_retry_delay_ms = 500;
        assert!(config.validate().is_err());
        config.max_retry_delay_ms = 10000;

        config.operation_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.operation_timeout_secs = 30;

        config.circuit_breaker_threshold = 0;
        assert!(config.validate().is_err());
        config.circuit_breaker_threshold = 5;

        config.circuit_breaker_reset_secs = 0;
        assert!(config.validate().is_err());
        config.circuit_breaker_reset_secs = 60;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_delay_progression() {
        let config = RecoveryConfig::default();
        for _ in 0..20 {
            assert!((1000..=1250).contains(&calculate_retry_delay(1, &config)));
            assert!((2000..=2500).contains(&calculate_retry_delay(2, &config)));
            assert!((4000..=5000).contains(&calculate_retry_delay(3, &config)));
        }
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let config = RecoveryConfig::default();
        let delay = calculate_retry_delay(12, &config);
        assert!((10000..=12500).contains(&delay));
    }

    #[test]
    fn test_retry_delay_tiny_base_has_no_jitter_panic() {
        let config = RecoveryConfig {
            base_retry_delay_ms: 1,
            max_retry_delay_ms: 2,
            ..Default::default()
        };
        assert_eq!(calculate_retry_delay(1, &config), 1);
        assert_eq!(calculate_retry_delay(2, &config), 2);
    }
}
