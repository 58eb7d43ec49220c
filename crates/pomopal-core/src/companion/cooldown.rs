use serde::{Deserialize, Serialize};

pub const DEFAULT_COOLDOWN_MS: u64 = 20_000;

/// Time after arming before the companion counts as "watching".
const WATCHING_AFTER_MS: u64 = 8_000;

/// Suppression window after a companion interaction.
///
/// Invariant: `remaining_ms <= total_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionCooldown {
    remaining_ms: u64,
    total_ms: u64,
}

impl Default for InteractionCooldown {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_MS)
    }
}

impl InteractionCooldown {
    pub fn new(total_ms: u64) -> Self {
        Self {
            remaining_ms: 0,
            total_ms,
        }
    }

    pub fn arm(&mut self) {
        self.remaining_ms = self.total_ms;
    }

    pub fn advance(&mut self, elapsed_ms: u64) {
        self.remaining_ms = self.remaining_ms.saturating_sub(elapsed_ms);
    }

    pub fn is_ready(&self) -> bool {
        self.remaining_ms == 0
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    /// Armed, and the first few seconds of the reaction have passed.
    pub fn is_watching(&self) -> bool {
        self.remaining_ms > 0 && self.remaining_ms + WATCHING_AFTER_MS < self.total_ms
    }
}
