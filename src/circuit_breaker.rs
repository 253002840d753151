//! # Circuit Breaker Module
//!
//! This module implements the circuit breaker pattern for calls to external
//! collaborators (Tesseract, the advice LLM, the sentiment model). It stops
//! sending requests for a while once a collaborator fails repeatedly.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::recovery::RecoveryConfig;

/// Circuit breaker guarding one external component
///
/// ```text
/// CLOSED ────failures ≥ threshold────► OPEN
///    ▲                                      │
///    │                                      │
///    └─────────reset timeout───────────────┘
/// ```
///
/// - **CLOSED → OPEN**: When failure count reaches `circuit_breaker_threshold`
/// - **OPEN → CLOSED**: After `circuit_breaker_reset_secs` elapse; the next call probes the component
/// - Any success resets the failure count
///
/// Each breaker is labelled with the component it protects so the
/// `circuit_breaker_state` gauge can be reported per component.
#[derive(Debug)]
pub struct CircuitBreaker {
    component: &'static str,
    state: Mutex<BreakerState>,
    config: RecoveryConfig,
}

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker for `component`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use medication_victory_plan::circuit_breaker::CircuitBreaker;
    /// use medication_victory_plan::recovery::RecoveryConfig;
    ///
    /// let breaker = CircuitBreaker::new("ocr", RecoveryConfig::default());
    /// assert!(!breaker.is_open());
    /// ```
    pub fn new(component: &'static str, config: RecoveryConfig) -> Self {
        Self {
            component,
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    /// Name of the protected component
    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Check if circuit breaker is open (blocking requests)
    ///
    /// Returns `true` when the failure count has reached the threshold and the
    /// reset timeout has not elapsed yet. Once the timeout elapses the counters
    /// are cleared and the breaker closes again.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock();

        if state.failure_count >= self.config.circuit_breaker_threshold {
            if let Some(last_time) = state.last_failure_time {
                if last_time.elapsed() < Duration::from_secs(self.config.circuit_breaker_reset_secs)
                {
                    return true;
                }
                *state = BreakerState::default();
            }
        }
        false
    }

    /// Record a failure to increment the failure counter
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
    }

    /// Record a success to reset the failure counter
    pub fn record_success(&self) {
        *self.state.lock() = BreakerState::default();
    }

    /// Current consecutive failure count
    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }
}
