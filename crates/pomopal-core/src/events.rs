use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{CycleChoice, Mode};

/// Every timer state change produces an Event.
/// The host turns them into companion triggers and side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        mode: Mode,
        remaining_secs: u32,
        /// True the first time a fresh focus session is entered in a cycle.
        arm_initial_cooldown: bool,
        at: DateTime<Utc>,
    },
    TimerPaused {
        mode: Mode,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// A focus phase ran down to zero.
    FocusCompleted {
        session_in_cycle: u8,
        /// Short break that started immediately, `None` when the cycle is
        /// full and the engine waits for a break choice.
        break_secs: Option<u32>,
        xp_awarded: u32,
        at: DateTime<Utc>,
    },
    ReportDismissed {
        at: DateTime<Utc>,
    },
    CycleCompleted {
        choice: CycleChoice,
        break_secs: u32,
        xp_awarded: u32,
        completed_cycles: u32,
        at: DateTime<Utc>,
    },
    /// Break ran out or was skipped; focus is running again.
    BreakCompleted {
        skipped: bool,
        avatar_swapped: Option<String>,
        at: DateTime<Utc>,
    },
    AvatarSwapped {
        image_src: String,
        at: DateTime<Utc>,
    },
    TimerReset {
        full: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Phase-completion transitions carry sound feedback and a persisted snapshot.
    pub fn is_phase_completion(&self) -> bool {
        matches!(
            self,
            Event::FocusCompleted { .. } | Event::BreakCompleted { skipped: false, .. }
        )
    }

    /// Whether the transition leaves the interactive focus session.
    pub fn leaves_focus(&self) -> bool {
        matches!(
            self,
            Event::FocusCompleted { .. } | Event::CycleCompleted { .. } | Event::TimerReset { .. }
        )
    }
}
