//! Exponential backoff with a circuit window.
//!
//! There is no retry loop. A failure opens the circuit for the current
//! backoff delay; the next organic trigger after the window re-attempts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 15_000,
            max_delay_ms: 2 * 60 * 1000,
        }
    }
}

/// Operator-facing classification of the current backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    /// Delay at most 30 s.
    Normal,
    /// Delay at most 60 s.
    Delayed,
    /// Failures have piled up.
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    consecutive_failures: u32,
    current_delay_ms: u64,
    circuit_open_until: Option<DateTime<Utc>>,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            consecutive_failures: 0,
            current_delay_ms: policy.base_delay_ms,
            circuit_open_until: None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn current_delay_ms(&self) -> u64 {
        self.current_delay_ms
    }

    pub fn circuit_open_until(&self) -> Option<DateTime<Utc>> {
        self.circuit_open_until
    }

    pub fn is_circuit_open(&self, now: DateTime<Utc>) -> bool {
        self.circuit_open_until.is_some_and(|until| until > now)
    }

    pub fn record_success(&mut self, policy: &RetryPolicy) {
        *self = Self::new(policy);
    }

    /// Double the delay (capped), count the failure and open the circuit
    /// until `now + delay`. Returns the new circuit deadline.
    pub fn record_failure(&mut self, policy: &RetryPolicy, now: DateTime<Utc>) -> DateTime<Utc> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.current_delay_ms = self
            .current_delay_ms
            .saturating_mul(2)
            .min(policy.max_delay_ms);
        let until = now + Duration::milliseconds(self.current_delay_ms as i64);
        self.circuit_open_until = Some(until);
        until
    }

    /// Manual reset from an operator control.
    pub fn reset(&mut self, policy: &RetryPolicy) {
        self.record_success(policy);
    }

    pub fn network_status(&self) -> NetworkStatus {
        match self.current_delay_ms {
            0..=30_000 => NetworkStatus::Normal,
            30_001..=60_000 => NetworkStatus::Delayed,
            _ => NetworkStatus::Degraded,
        }
    }
}
