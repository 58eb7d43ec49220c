//! Companion response scheduling.
//!
//! Decides what the companion says for each trigger, shields the caller
//! from remote-call latency and failure, and throttles interactions.
//!
//! - [`CompanionScheduler`]: dispatch, completion and alert bookkeeping
//! - [`DialogueCache`]: per-kind pools of previously generated lines
//! - [`RetryState`]: exponential backoff and circuit window
//! - [`InteractionCooldown`]: click throttling
//! - [`LineGenerator`]: the remote generation capability

mod cache;
mod cooldown;
mod generator;
mod http;
pub mod phrases;
mod retry;
mod scheduler;

use serde::{Deserialize, Serialize};

pub use cache::{DialogueCache, DEFAULT_CACHE_CAPACITY};
pub use cooldown::{InteractionCooldown, DEFAULT_COOLDOWN_MS};
pub use generator::{GenerationContext, LineGenerator};
pub use http::{classify_status, HttpLineGenerator};
pub use retry::{NetworkStatus, RetryPolicy, RetryState};
pub use scheduler::{
    CompanionLine, CompanionScheduler, Dispatch, Interaction, LineSource, PendingRequest,
    SchedulerConfig, ServiceAlert,
};

/// What caused the companion to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// A focus session started.
    Start,
    /// A focus session was paused.
    Pause,
    /// The user poked the companion.
    Click,
    /// The user came back after wandering off mid-focus.
    Scolding,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 4] = [
        TriggerKind::Start,
        TriggerKind::Pause,
        TriggerKind::Click,
        TriggerKind::Scolding,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::Start => "start",
            TriggerKind::Pause => "pause",
            TriggerKind::Click => "click",
            TriggerKind::Scolding => "scolding",
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(TriggerKind::Start),
            "pause" => Ok(TriggerKind::Pause),
            "click" => Ok(TriggerKind::Click),
            "scolding" => Ok(TriggerKind::Scolding),
            other => Err(format!("unknown trigger kind: {other}")),
        }
    }
}
