//! Focus cycle engine.
//!
//! The engine is a tick-driven state machine. It does not own a clock or
//! a thread - the caller invokes `tick()` once per second while running.
//!
//! ## State Transitions
//!
//! ```text
//! FocusPaused <-> FocusRunning --(0s, session < 4)--> BreakRunning <-> BreakPaused
//!                      |                                   |
//!                      +--(0s, session == 4)--> AwaitingCycleChoice
//!                                                          |
//!                     FocusRunning <--(0s | skip)-- BreakRunning <--(choice)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(CyclePlan::default());
//! engine.toggle_active();
//! // Once per second:
//! if let Some(event) = engine.tick() { /* phase completed */ }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::events::Event;

/// Focus sessions per cycle.
pub const CYCLE_LENGTH: u8 = 4;

/// Countdown value the operator "time leap" control jumps to.
pub const TIME_LEAP_SECS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Focus,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    FocusRunning,
    FocusPaused,
    BreakRunning,
    BreakPaused,
    /// Cycle finished; waiting for the report and the break-length choice.
    AwaitingCycleChoice,
}

/// Break length picked at the end of a full cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CycleChoice {
    /// Long rest, small XP reward.
    Long,
    /// Short rest, large XP reward.
    Short,
}

/// Durations and rewards for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePlan {
    pub focus_secs: u32,
    pub short_break_secs: u32,
    pub long_choice_secs: u32,
    pub short_choice_secs: u32,
    pub focus_session_xp: u32,
    pub long_choice_xp: u32,
    pub short_choice_xp: u32,
}

impl Default for CyclePlan {
    fn default() -> Self {
        Self {
            focus_secs: 25 * 60,
            short_break_secs: 5 * 60,
            long_choice_secs: 30 * 60,
            short_choice_secs: 5 * 60,
            focus_session_xp: 10,
            long_choice_xp: 5,
            short_choice_xp: 30,
        }
    }
}

impl CyclePlan {
    pub fn choice_secs(&self, choice: CycleChoice) -> u32 {
        match choice {
            CycleChoice::Long => self.long_choice_secs,
            CycleChoice::Short => self.short_choice_secs,
        }
    }

    pub fn choice_xp(&self, choice: CycleChoice) -> u32 {
        match choice {
            CycleChoice::Long => self.long_choice_xp,
            CycleChoice::Short => self.short_choice_xp,
        }
    }
}

/// Persisted timer values used to resume after a restart.
///
/// Every field is optional so that a profile written before the first
/// session restores into the default paused focus state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub saved_time_left: Option<u32>,
    pub saved_is_active: Option<bool>,
    pub saved_is_break: Option<bool>,
    pub saved_session_in_cycle: Option<u8>,
    /// Length of the saved break, so a restored long break reloads in full.
    pub saved_phase_total: Option<u32>,
    #[serde(default)]
    pub completed_cycles: u32,
}

/// Predicate the companion scheduler consults before refilling lines.
pub trait RefillGate {
    /// True whenever companion refills must be suppressed.
    fn should_block_refill(&self) -> bool;
}

impl RefillGate for bool {
    fn should_block_refill(&self) -> bool {
        *self
    }
}

/// Core cycle engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    plan: CyclePlan,
    mode: Mode,
    is_active: bool,
    time_left_secs: u32,
    /// Full length of the current phase, reloaded by a session reset.
    phase_total_secs: u32,
    session_in_cycle: u8,
    completed_cycles: u32,
    awaiting_choice: bool,
    report_pending: bool,
    /// One-shot: the initial companion cooldown already fired for this
    /// cycle entry. Cleared when `session_in_cycle` changes or a break begins.
    initial_cooldown_fired: bool,
    avatar: Option<String>,
    pending_avatar: Option<String>,
}

impl TimerEngine {
    /// Create an engine paused at the start of a fresh focus session.
    pub fn new(plan: CyclePlan) -> Self {
        let focus = plan.focus_secs;
        Self {
            plan,
            mode: Mode::Focus,
            is_active: false,
            time_left_secs: focus,
            phase_total_secs: focus,
            session_in_cycle: 0,
            completed_cycles: 0,
            awaiting_choice: false,
            report_pending: false,
            initial_cooldown_fired: false,
            avatar: None,
            pending_avatar: None,
        }
    }

    /// Rebuild an engine from persisted values (resume semantics).
    ///
    /// A saved focus with a full cycle restores into `AwaitingCycleChoice`.
    pub fn restore(plan: CyclePlan, snapshot: &SessionSnapshot) -> Self {
        let mut engine = Self::new(plan);
        engine.completed_cycles = snapshot.completed_cycles;
        engine.session_in_cycle = snapshot
            .saved_session_in_cycle
            .unwrap_or(0)
            .min(CYCLE_LENGTH);

        let is_break = snapshot.saved_is_break.unwrap_or(false);
        if is_break {
            engine.mode = Mode::Break;
            engine.phase_total_secs = snapshot
                .saved_phase_total
                .unwrap_or(engine.plan.short_break_secs);
        }

        if !is_break && engine.session_in_cycle == CYCLE_LENGTH {
            engine.enter_awaiting_choice();
            return engine;
        }

        engine.time_left_secs = snapshot
            .saved_time_left
            .unwrap_or(engine.phase_total_secs);
        engine.phase_total_secs = engine.phase_total_secs.max(engine.time_left_secs);
        engine.is_active = snapshot.saved_is_active.unwrap_or(false);
        engine
    }

    /// Attach the currently shown avatar and any swap queued before restart.
    pub fn with_avatar(mut self, avatar: Option<String>, pending: Option<String>) -> Self {
        self.avatar = avatar;
        self.pending_avatar = pending;
        if self.accepts_avatar_now() {
            if let Some(src) = self.pending_avatar.take() {
                self.avatar = Some(src);
            }
        }
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        if self.awaiting_choice {
            return TimerState::AwaitingCycleChoice;
        }
        match (self.mode, self.is_active) {
            (Mode::Focus, true) => TimerState::FocusRunning,
            (Mode::Focus, false) => TimerState::FocusPaused,
            (Mode::Break, true) => TimerState::BreakRunning,
            (Mode::Break, false) => TimerState::BreakPaused,
        }
    }

    pub fn plan(&self) -> &CyclePlan {
        &self.plan
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Running countdown in focus, i.e. the companion is "on duty".
    pub fn is_focus_running(&self) -> bool {
        self.state() == TimerState::FocusRunning
    }

    pub fn time_left_secs(&self) -> u32 {
        self.time_left_secs
    }

    pub fn phase_total_secs(&self) -> u32 {
        self.phase_total_secs
    }

    pub fn session_in_cycle(&self) -> u8 {
        self.session_in_cycle
    }

    pub fn completed_cycles(&self) -> u32 {
        self.completed_cycles
    }

    pub fn report_pending(&self) -> bool {
        self.report_pending
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub fn pending_avatar(&self) -> Option<&str> {
        self.pending_avatar.as_deref()
    }

    /// 0.0 .. 100.0 progress across the whole cycle's focus time.
    pub fn cycle_progress_pct(&self) -> f64 {
        let focus = self.plan.focus_secs as f64;
        if focus == 0.0 {
            return 0.0;
        }
        let total = focus * CYCLE_LENGTH as f64;
        let mut done = self.session_in_cycle as f64 * focus;
        if self.mode == Mode::Focus && !self.awaiting_choice {
            done += focus - self.time_left_secs.min(self.plan.focus_secs) as f64;
        }
        (done / total * 100.0).min(100.0)
    }

    /// Values to hand to the persistence collaborator.
    pub fn session_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            saved_time_left: Some(self.time_left_secs),
            saved_is_active: Some(self.is_active),
            saved_is_break: Some(self.mode == Mode::Break),
            saved_session_in_cycle: Some(self.session_in_cycle),
            saved_phase_total: Some(self.phase_total_secs),
            completed_cycles: self.completed_cycles,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Flip between running and paused in the current phase.
    pub fn toggle_active(&mut self) -> Option<Event> {
        if self.awaiting_choice {
            return None;
        }
        if self.is_active {
            self.is_active = false;
            return Some(Event::TimerPaused {
                mode: self.mode,
                remaining_secs: self.time_left_secs,
                at: Utc::now(),
            });
        }

        let arm_initial_cooldown = self.mode == Mode::Focus
            && self.session_in_cycle == 0
            && !self.initial_cooldown_fired;
        if arm_initial_cooldown {
            self.initial_cooldown_fired = true;
        }
        self.is_active = true;
        Some(Event::TimerStarted {
            mode: self.mode,
            remaining_secs: self.time_left_secs,
            arm_initial_cooldown,
            at: Utc::now(),
        })
    }

    /// Call once per second. Returns an event when the phase completes.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.is_active || self.awaiting_choice {
            return None;
        }
        if self.time_left_secs > 0 {
            self.time_left_secs -= 1;
        }
        if self.time_left_secs == 0 {
            return Some(self.complete_phase());
        }
        None
    }

    /// Close the diary/report step that precedes the break choice.
    pub fn dismiss_report(&mut self) -> Option<Event> {
        if !self.awaiting_choice || !self.report_pending {
            return None;
        }
        self.report_pending = false;
        Some(Event::ReportDismissed { at: Utc::now() })
    }

    /// Resolve `AwaitingCycleChoice` into a running break.
    pub fn choose_break(&mut self, choice: CycleChoice) -> Option<Event> {
        if !self.awaiting_choice || self.report_pending {
            return None;
        }
        self.awaiting_choice = false;
        self.set_session_in_cycle(0);
        self.completed_cycles += 1;
        let break_secs = self.plan.choice_secs(choice);
        self.begin_break(break_secs);
        Some(Event::CycleCompleted {
            choice,
            break_secs,
            xp_awarded: self.plan.choice_xp(choice),
            completed_cycles: self.completed_cycles,
            at: Utc::now(),
        })
    }

    pub fn skip_break(&mut self) -> Option<Event> {
        if self.mode != Mode::Break {
            return None;
        }
        Some(self.end_break(true))
    }

    /// `full = false` reloads the current phase and pauses; `full = true`
    /// also restarts the cycle from the first focus session.
    pub fn reset(&mut self, full: bool) -> Option<Event> {
        if full {
            self.awaiting_choice = false;
            self.report_pending = false;
            self.set_session_in_cycle(0);
            self.mode = Mode::Focus;
            self.phase_total_secs = self.plan.focus_secs;
        } else if self.awaiting_choice {
            return None;
        }
        self.time_left_secs = self.phase_total_secs;
        self.is_active = false;
        Some(Event::TimerReset {
            full,
            at: Utc::now(),
        })
    }

    /// Queue an avatar swap. Applied immediately during focus, otherwise
    /// deferred to the start of the next focus phase.
    pub fn request_avatar_swap(&mut self, image_src: String) -> Option<Event> {
        if self.accepts_avatar_now() {
            self.pending_avatar = None;
            self.avatar = Some(image_src.clone());
            return Some(Event::AvatarSwapped {
                image_src,
                at: Utc::now(),
            });
        }
        self.pending_avatar = Some(image_src);
        None
    }

    /// Operator control: set the countdown to ten seconds.
    pub fn time_leap(&mut self) {
        if !self.awaiting_choice {
            self.time_left_secs = TIME_LEAP_SECS;
            self.phase_total_secs = self.phase_total_secs.max(TIME_LEAP_SECS);
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete_phase(&mut self) -> Event {
        match self.mode {
            Mode::Focus => {
                let next = self.session_in_cycle + 1;
                self.set_session_in_cycle(next);
                let xp_awarded = self.plan.focus_session_xp;
                let break_secs = if next < CYCLE_LENGTH {
                    let secs = self.plan.short_break_secs;
                    self.begin_break(secs);
                    Some(secs)
                } else {
                    self.enter_awaiting_choice();
                    None
                };
                Event::FocusCompleted {
                    session_in_cycle: next,
                    break_secs,
                    xp_awarded,
                    at: Utc::now(),
                }
            }
            Mode::Break => self.end_break(false),
        }
    }

    fn begin_break(&mut self, secs: u32) {
        self.mode = Mode::Break;
        self.is_active = true;
        self.time_left_secs = secs;
        self.phase_total_secs = secs;
        self.initial_cooldown_fired = false;
    }

    fn enter_awaiting_choice(&mut self) {
        self.awaiting_choice = true;
        self.report_pending = true;
        self.is_active = false;
        self.time_left_secs = 0;
    }

    fn end_break(&mut self, skipped: bool) -> Event {
        self.mode = Mode::Focus;
        self.is_active = true;
        self.time_left_secs = self.plan.focus_secs;
        self.phase_total_secs = self.plan.focus_secs;
        let avatar_swapped = self.pending_avatar.take();
        if let Some(src) = &avatar_swapped {
            self.avatar = Some(src.clone());
        }
        Event::BreakCompleted {
            skipped,
            avatar_swapped,
            at: Utc::now(),
        }
    }

    fn set_session_in_cycle(&mut self, value: u8) {
        debug_assert!(value <= CYCLE_LENGTH, "session_in_cycle out of range");
        if value != self.session_in_cycle {
            self.initial_cooldown_fired = false;
        }
        self.session_in_cycle = value;
    }

    fn accepts_avatar_now(&self) -> bool {
        self.mode == Mode::Focus && !self.awaiting_choice
    }
}

impl RefillGate for TimerEngine {
    fn should_block_refill(&self) -> bool {
        self.mode == Mode::Break || self.awaiting_choice
    }
}

/// Format seconds as `MM:SS`.
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
