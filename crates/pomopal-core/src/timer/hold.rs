//! Press-and-hold reset gesture.
//!
//! A quick tap reloads the current phase, a long hold restarts the whole
//! cycle, and releasing anywhere in between is a no-op. Progress is derived
//! from wall-clock time since the hold began, so sampling frequency does
//! not change the outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Thresholds for the reset gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldThresholds {
    /// Releases strictly shorter than this reset the current phase only.
    pub session_reset_max_ms: u64,
    /// Holding this long resets the whole cycle.
    pub full_reset_ms: u64,
    /// Holding this long surfaces a "keep holding" hint once.
    pub hint_ms: u64,
}

impl Default for HoldThresholds {
    fn default() -> Self {
        Self {
            session_reset_max_ms: 300,
            full_reset_ms: 2_000,
            hint_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldOutcome {
    SessionReset,
    FullReset,
    Cancelled,
}

/// Result of one progress sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldSample {
    /// 0.0 ..= 100.0
    pub progress: f64,
    /// True exactly once per hold, when the hint threshold is crossed.
    pub show_hint: bool,
    /// Set when the hold reached 100% and fired on its own.
    pub outcome: Option<HoldOutcome>,
}

#[derive(Debug, Clone, Default)]
pub struct ResetHold {
    thresholds: HoldThresholds,
    started_at: Option<DateTime<Utc>>,
    hint_shown: bool,
}

impl ResetHold {
    pub fn new(thresholds: HoldThresholds) -> Self {
        Self {
            thresholds,
            started_at: None,
            hint_shown: false,
        }
    }

    pub fn thresholds(&self) -> &HoldThresholds {
        &self.thresholds
    }

    pub fn is_holding(&self) -> bool {
        self.started_at.is_some()
    }

    /// Start a hold. Returns false if one is already in progress.
    pub fn begin(&mut self, now: DateTime<Utc>) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(now);
        self.hint_shown = false;
        true
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        self.started_at
            .map(|start| (now - start).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// `min(100, elapsed / full_reset_ms * 100)`, zero when idle.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if !self.is_holding() || self.thresholds.full_reset_ms == 0 {
            return 0.0;
        }
        let elapsed = self.elapsed_ms(now) as f64;
        (elapsed / self.thresholds.full_reset_ms as f64 * 100.0).min(100.0)
    }

    /// Per-frame sample. Fires the full reset once progress reaches 100%.
    pub fn sample(&mut self, now: DateTime<Utc>) -> HoldSample {
        let progress = self.progress(now);
        if !self.is_holding() {
            return HoldSample {
                progress,
                show_hint: false,
                outcome: None,
            };
        }

        let show_hint = !self.hint_shown && self.elapsed_ms(now) >= self.thresholds.hint_ms;
        if show_hint {
            self.hint_shown = true;
        }

        let outcome = if progress >= 100.0 {
            self.release(now)
        } else {
            None
        };
        HoldSample {
            progress,
            show_hint,
            outcome,
        }
    }

    /// End the hold and classify it. `None` when no hold was in progress.
    pub fn release(&mut self, now: DateTime<Utc>) -> Option<HoldOutcome> {
        let elapsed = self.elapsed_ms(now);
        self.started_at.take()?;
        let outcome = if elapsed >= self.thresholds.full_reset_ms {
            HoldOutcome::FullReset
        } else if elapsed < self.thresholds.session_reset_max_ms {
            HoldOutcome::SessionReset
        } else {
            HoldOutcome::Cancelled
        };
        Some(outcome)
    }

    /// Abort without effect (pointer left the control).
    pub fn cancel(&mut self) -> bool {
        self.started_at.take().is_some()
    }
}
