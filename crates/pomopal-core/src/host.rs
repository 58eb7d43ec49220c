//! Host coordinator.
//!
//! Owns the timer engine, the companion scheduler, the reset gesture and
//! the in-memory profile. Each operation applies its transition and
//! returns the [`Effect`]s the driver must carry out: remote calls to
//! spawn, lines and notices to show, events to forward.
//!
//! Side effects that must never block a transition are handled here
//! in-line and swallowed on failure (feedback, persistence).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::companion::{
    CompanionLine, CompanionScheduler, Dispatch, GenerationContext, LineGenerator, NetworkStatus,
    PendingRequest, ServiceAlert, TriggerKind,
};
use crate::error::{CoreError, GenerationFailure};
use crate::events::Event;
use crate::feedback::{audio_context, FeedbackSettings, FeedbackSink};
use crate::profile::{write_export, CycleStats, DiaryEntry, ProfileSnapshot, ProfileStore, ProfileUpdate};
use crate::storage::Config;
use crate::timer::{
    format_clock, CycleChoice, HoldOutcome, HoldSample, Mode, RefillGate, ResetHold, TimerEngine,
    TimerState,
};

/// User-visible notifications that are not companion lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    /// Keep holding to restart the whole cycle.
    HoldHint,
    SessionReset,
    FullReset,
    /// The cycle is full; show the report before the break choice.
    ReportReady { stats: CycleStats },
    DiarySaved { entries: usize },
    LevelUp { level: u32 },
    /// A sticky alert is waiting, surfaced only outside focus.
    Alert { alert: ServiceAlert },
    UpdateAvailable,
    Exported { path: PathBuf },
    ExportFailed { message: String },
}

/// Work handed back to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Event(Event),
    Line(CompanionLine),
    Notice(Notice),
    /// Perform the remote call and report back via
    /// [`CompanionHost::complete_generation`].
    Generate(PendingRequest),
    /// Fetch the version descriptor in the background.
    CheckVersion,
}

/// Everything a status line or `status --json` needs.
#[derive(Debug, Clone, Serialize)]
pub struct HostStatus {
    pub state: TimerState,
    pub mode: Mode,
    pub time_left_secs: u32,
    pub clock: String,
    pub session_in_cycle: u8,
    pub completed_cycles: u32,
    pub cycle_progress_pct: f64,
    pub message: Option<CompanionLine>,
    pub alert: Option<ServiceAlert>,
    pub network_status: NetworkStatus,
    pub retry_delay_ms: u64,
    pub consecutive_failures: u32,
    pub model: String,
    pub cooldown_remaining_ms: u64,
    pub watching: bool,
    pub level: u32,
    pub xp: u32,
    pub max_xp_for_next_level: u32,
    pub stats: CycleStats,
    pub suppressed_interactions: u32,
    pub update_available: bool,
    pub avatar: Option<String>,
    pub pending_avatar: Option<String>,
    pub holding: bool,
}

pub struct CompanionHost {
    engine: TimerEngine,
    scheduler: CompanionScheduler,
    hold: ResetHold,
    profile: ProfileSnapshot,
    store: Arc<dyn ProfileStore>,
    feedback: Arc<dyn FeedbackSink>,
    feedback_settings: FeedbackSettings,
    stats: CycleStats,
    update_available: bool,
    /// Updates whose save failed, retried with the next save.
    unsaved: ProfileUpdate,
}

impl CompanionHost {
    /// Restore from the persisted profile.
    ///
    /// Sound follows the profile once it has been enabled there, otherwise
    /// the `[sound]` section of the config.
    pub fn new(
        config: &Config,
        profile: ProfileSnapshot,
        store: Arc<dyn ProfileStore>,
        generator: Arc<dyn LineGenerator>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        let scheduler = CompanionScheduler::new(generator, config.scheduler_config());
        Self::with_scheduler(config, profile, store, scheduler, feedback)
    }

    /// Like [`Self::new`] with a pre-built scheduler (seeded, for tests).
    pub fn with_scheduler(
        config: &Config,
        profile: ProfileSnapshot,
        store: Arc<dyn ProfileStore>,
        mut scheduler: CompanionScheduler,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        let engine = TimerEngine::restore(config.cycle_plan(), &profile.session())
            .with_avatar(profile.image_src.clone(), profile.pending_image_src.clone());
        scheduler.restore_cache(profile.dialogue_cache.clone());
        let feedback_settings = if profile.is_sound_enabled {
            FeedbackSettings {
                enabled: true,
                volume: profile.sound_volume,
            }
        } else {
            FeedbackSettings {
                enabled: config.sound.enabled,
                volume: config.sound.volume,
            }
        };
        tracing::info!(
            state = ?engine.state(),
            session_in_cycle = engine.session_in_cycle(),
            cached_lines = profile.dialogue_cache.total_len(),
            "host restored"
        );
        Self {
            stats: profile.cycle_stats,
            engine,
            scheduler,
            hold: ResetHold::new(config.hold_thresholds()),
            profile,
            store,
            feedback,
            feedback_settings,
            update_available: false,
            unsaved: ProfileUpdate::default(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn scheduler(&self) -> &CompanionScheduler {
        &self.scheduler
    }

    pub fn generator(&self) -> Arc<dyn LineGenerator> {
        self.scheduler.generator()
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn update_available(&self) -> bool {
        self.update_available
    }

    pub fn is_holding(&self) -> bool {
        self.hold.is_holding()
    }

    pub fn feedback_settings(&self) -> FeedbackSettings {
        self.feedback_settings
    }

    /// The alert to show now: only outside running focus.
    pub fn surfaced_alert(&self) -> Option<ServiceAlert> {
        if self.engine.should_block_refill() {
            self.scheduler.alert()
        } else {
            None
        }
    }

    /// Coherent copy of the profile including live timer, cache and stats.
    pub fn profile(&self) -> ProfileSnapshot {
        let mut profile = self.profile.clone();
        let session = self.engine.session_snapshot();
        profile.saved_time_left = session.saved_time_left;
        profile.saved_is_active = session.saved_is_active;
        profile.saved_is_break = session.saved_is_break;
        profile.saved_session_in_cycle = session.saved_session_in_cycle;
        profile.total_completed_cycles = session.completed_cycles;
        profile.dialogue_cache = self.scheduler.cache().clone();
        profile.cycle_stats = self.stats;
        profile.image_src = self.engine.avatar().map(String::from);
        profile.pending_image_src = self.engine.pending_avatar().map(String::from);
        profile
    }

    pub fn status(&self) -> HostStatus {
        let retry = self.scheduler.retry_state();
        HostStatus {
            state: self.engine.state(),
            mode: self.engine.mode(),
            time_left_secs: self.engine.time_left_secs(),
            clock: format_clock(self.engine.time_left_secs()),
            session_in_cycle: self.engine.session_in_cycle(),
            completed_cycles: self.engine.completed_cycles(),
            cycle_progress_pct: self.engine.cycle_progress_pct(),
            message: self.scheduler.message().cloned(),
            alert: self.surfaced_alert(),
            network_status: retry.network_status(),
            retry_delay_ms: retry.current_delay_ms(),
            consecutive_failures: retry.consecutive_failures(),
            model: self.scheduler.model_name().to_string(),
            cooldown_remaining_ms: self.scheduler.cooldown().remaining_ms(),
            watching: self.scheduler.cooldown().is_watching(),
            level: self.profile.level,
            xp: self.profile.xp,
            max_xp_for_next_level: self.profile.max_xp_for_next_level,
            stats: self.stats,
            suppressed_interactions: self.scheduler.suppressed_interactions(),
            update_available: self.update_available,
            avatar: self.engine.avatar().map(String::from),
            pending_avatar: self.engine.pending_avatar().map(String::from),
            holding: self.hold.is_holding(),
        }
    }

    fn context(&self) -> GenerationContext {
        GenerationContext::from_profile(&self.profile)
    }

    // ── Timer ────────────────────────────────────────────────────────

    /// Start/pause button. Counts as a user gesture for audio.
    pub fn toggle_active(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        audio_context().ensure_active();
        let mut effects = Vec::new();
        let Some(event) = self.engine.toggle_active() else {
            return effects;
        };
        match &event {
            Event::TimerStarted {
                mode: Mode::Focus,
                arm_initial_cooldown,
                ..
            } => {
                if *arm_initial_cooldown {
                    self.scheduler.trigger_cooldown();
                }
                self.trigger(TriggerKind::Start, now, &mut effects);
            }
            Event::TimerPaused {
                mode: Mode::Focus, ..
            } => self.trigger(TriggerKind::Pause, now, &mut effects),
            _ => {}
        }
        effects.insert(0, Effect::Event(event));
        self.persist_session(now);
        effects
    }

    /// One-second countdown step. The interaction cooldown drains with it.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.engine.is_active() {
            return effects;
        }
        self.scheduler.advance_cooldown(1_000);
        if let Some(event) = self.engine.tick() {
            self.apply_event(event, now, &mut effects);
        }
        self.persist_session(now);
        effects
    }

    pub fn skip_break(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(event) = self.engine.skip_break() {
            self.apply_event(event, now, &mut effects);
            self.persist_session(now);
        }
        effects
    }

    /// Close the cycle report. Clears the cycle statistics.
    pub fn dismiss_report(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(event) = self.engine.dismiss_report() {
            self.stats = CycleStats::default();
            effects.push(Effect::Event(event));
            self.persist_session(now);
        }
        effects
    }

    pub fn choose_break(&mut self, choice: CycleChoice, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(event) = self.engine.choose_break(choice) {
            self.apply_event(event, now, &mut effects);
            self.persist_session(now);
        }
        effects
    }

    /// Save a diary entry from the cycle report.
    pub fn save_diary(&mut self, content: &str, date: &str, now: DateTime<Utc>) -> Vec<Effect> {
        if !self.engine.report_pending() || content.trim().is_empty() {
            return Vec::new();
        }
        let mut profile = self.profile.clone();
        profile.push_diary(DiaryEntry::new(
            content.trim(),
            date,
            self.stats,
            self.profile.level,
            now,
        ));
        let entries = profile.diary_history.len();
        self.persist(ProfileUpdate {
            diary_history: Some(profile.diary_history),
            ..ProfileUpdate::default()
        });
        vec![Effect::Notice(Notice::DiarySaved { entries })]
    }

    // ── Companion ────────────────────────────────────────────────────

    /// Poke at the companion.
    pub fn click(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = Vec::new();
        let context = self.context();
        let interaction = self.scheduler.handle_interaction(
            self.engine.is_active(),
            self.engine.mode() == Mode::Break,
            &self.engine,
            context,
            now,
        );
        if !interaction.blocked {
            self.stats.clicks += 1;
            self.persist_stats();
        }
        if let Some(dispatch) = interaction.dispatch {
            self.push_dispatch(dispatch, &mut effects);
        }
        effects
    }

    /// The user came back after wandering off.
    pub fn distraction(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.engine.is_focus_running() {
            return effects;
        }
        self.stats.distractions += 1;
        self.persist_stats();
        self.trigger(TriggerKind::Scolding, now, &mut effects);
        effects
    }

    /// Apply the result of a remote call issued as [`Effect::Generate`].
    pub fn complete_generation(
        &mut self,
        request: PendingRequest,
        result: Result<String, GenerationFailure>,
        now: DateTime<Utc>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let alert_before = self.surfaced_alert();
        if let Some(line) = self.scheduler.complete(request, result, now) {
            effects.push(Effect::Line(line));
        }
        self.persist_cache();
        if let Some(alert) = self.surfaced_alert().filter(|a| Some(*a) != alert_before) {
            effects.push(Effect::Notice(Notice::Alert { alert }));
        }
        effects
    }

    pub fn acknowledge_alert(&mut self) -> Option<ServiceAlert> {
        self.scheduler.acknowledge_alert()
    }

    fn trigger(&mut self, kind: TriggerKind, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        let context = self.context();
        let dispatch = self.scheduler.dispatch(kind, &self.engine, context, now);
        self.push_dispatch(dispatch, effects);
    }

    fn push_dispatch(&mut self, dispatch: Dispatch, effects: &mut Vec<Effect>) {
        match dispatch {
            Dispatch::Blocked | Dispatch::InFlight => {}
            Dispatch::Served(line) => {
                effects.push(Effect::Line(line));
                self.persist_cache();
            }
            Dispatch::Request(request) => effects.push(Effect::Generate(request)),
        }
    }

    // ── Reset gesture ────────────────────────────────────────────────

    pub fn hold_begin(&mut self, now: DateTime<Utc>) -> bool {
        self.hold.begin(now)
    }

    /// Per-frame sample; fires the full reset at 100%.
    pub fn hold_sample(&mut self, now: DateTime<Utc>) -> (HoldSample, Vec<Effect>) {
        let sample = self.hold.sample(now);
        let mut effects = Vec::new();
        if sample.show_hint {
            effects.push(Effect::Notice(Notice::HoldHint));
        }
        if let Some(outcome) = sample.outcome {
            self.apply_hold_outcome(outcome, now, &mut effects);
        }
        (sample, effects)
    }

    pub fn hold_release(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(outcome) = self.hold.release(now) {
            self.apply_hold_outcome(outcome, now, &mut effects);
        }
        effects
    }

    pub fn hold_cancel(&mut self) -> bool {
        self.hold.cancel()
    }

    fn apply_hold_outcome(&mut self, outcome: HoldOutcome, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        let full = match outcome {
            HoldOutcome::Cancelled => return,
            HoldOutcome::SessionReset => false,
            HoldOutcome::FullReset => true,
        };
        let Some(event) = self.engine.reset(full) else {
            return;
        };
        if full {
            self.stats = CycleStats::default();
            self.scheduler.reset_interactions();
        }
        self.apply_event(event, now, effects);
        effects.push(Effect::Notice(if full {
            Notice::FullReset
        } else {
            Notice::SessionReset
        }));
        self.persist_session(now);
    }

    // ── Profile ──────────────────────────────────────────────────────

    /// Apply immediately in focus, otherwise at the start of the next focus.
    pub fn request_avatar_swap(&mut self, image_src: String, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.engine.request_avatar_swap(image_src) {
            Some(event) => self.apply_event(event, now, &mut effects),
            None => self.persist(ProfileUpdate {
                pending_image_src: Some(self.engine.pending_avatar().map(String::from)),
                ..ProfileUpdate::default()
            }),
        }
        effects
    }

    /// Enabling sound counts as a user gesture for audio.
    pub fn set_sound(&mut self, enabled: bool, volume: u8) {
        let volume = volume.clamp(1, 4);
        if enabled {
            audio_context().ensure_active();
        }
        self.feedback_settings = FeedbackSettings { enabled, volume };
        self.persist(ProfileUpdate {
            is_sound_enabled: Some(enabled),
            sound_volume: Some(volume),
            ..ProfileUpdate::default()
        });
    }

    pub fn mark_update_available(&mut self) -> Vec<Effect> {
        if self.update_available {
            return Vec::new();
        }
        self.update_available = true;
        vec![Effect::Notice(Notice::UpdateAvailable)]
    }

    /// Write a credential-free export of the current profile into `dir`.
    pub fn export(&self, dir: &Path, at: DateTime<Local>) -> Result<PathBuf, CoreError> {
        let path = write_export(&self.profile(), dir, &at)?;
        tracing::info!(path = %path.display(), "profile exported");
        Ok(path)
    }

    // ── Operator controls ────────────────────────────────────────────

    pub fn toggle_expiry_alert(&mut self) -> Option<ServiceAlert> {
        self.scheduler.toggle_expiry_alert()
    }

    pub fn toggle_congested(&mut self) -> Option<ServiceAlert> {
        self.scheduler.toggle_congested()
    }

    pub fn time_leap(&mut self, now: DateTime<Utc>) {
        self.engine.time_leap();
        self.persist_session(now);
    }

    pub fn set_level(&mut self, level: u32) {
        let mut profile = self.profile.clone();
        profile.set_level(level);
        self.persist(ProfileUpdate {
            level: Some(profile.level),
            xp: Some(profile.xp),
            max_xp_for_next_level: Some(profile.max_xp_for_next_level),
            ..ProfileUpdate::default()
        });
    }

    pub fn reset_network(&mut self) {
        self.scheduler.reset_retry();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply_event(&mut self, event: Event, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        let position = effects.len();
        if event.is_phase_completion() {
            self.feedback.play_feedback(self.feedback_settings);
        }
        if event.leaves_focus() {
            self.scheduler.cancel_display();
        }

        match &event {
            Event::FocusCompleted {
                break_secs,
                xp_awarded,
                session_in_cycle,
                ..
            } => {
                tracing::info!(session_in_cycle, "focus session completed");
                self.award_xp(*xp_awarded, effects);
                self.persist(ProfileUpdate {
                    total_focus_minutes: Some(
                        self.profile.total_focus_minutes + self.engine.plan().focus_secs / 60,
                    ),
                    ..ProfileUpdate::default()
                });
                if break_secs.is_some() {
                    self.enter_break(effects);
                } else {
                    effects.push(Effect::Notice(Notice::ReportReady { stats: self.stats }));
                }
            }
            Event::CycleCompleted {
                choice, xp_awarded, ..
            } => {
                tracing::info!(?choice, "cycle completed");
                self.award_xp(*xp_awarded, effects);
                self.enter_break(effects);
            }
            Event::BreakCompleted { avatar_swapped, .. } => {
                tracing::info!("break over, focus running");
                if avatar_swapped.is_some() {
                    self.persist(ProfileUpdate {
                        image_src: Some(avatar_swapped.clone()),
                        pending_image_src: Some(None),
                        ..ProfileUpdate::default()
                    });
                }
            }
            Event::AvatarSwapped { image_src, .. } => self.persist(ProfileUpdate {
                image_src: Some(Some(image_src.clone())),
                pending_image_src: Some(None),
                ..ProfileUpdate::default()
            }),
            Event::TimerReset { full, .. } => tracing::info!(full, "timer reset"),
            _ => {}
        }
        effects.insert(position, Effect::Event(event));
    }

    fn enter_break(&mut self, effects: &mut Vec<Effect>) {
        effects.push(Effect::CheckVersion);
        if let Some(alert) = self.surfaced_alert() {
            effects.push(Effect::Notice(Notice::Alert { alert }));
        }
    }

    fn award_xp(&mut self, amount: u32, effects: &mut Vec<Effect>) {
        let mut profile = self.profile.clone();
        if profile.award_xp(amount) > 0 {
            effects.push(Effect::Notice(Notice::LevelUp {
                level: profile.level,
            }));
        }
        self.persist(ProfileUpdate {
            xp: Some(profile.xp),
            level: Some(profile.level),
            max_xp_for_next_level: Some(profile.max_xp_for_next_level),
            ..ProfileUpdate::default()
        });
    }

    fn persist_session(&mut self, now: DateTime<Utc>) {
        let mut update = ProfileUpdate::from_session(&self.engine.session_snapshot(), now);
        update.cycle_stats = Some(self.stats);
        self.persist(update);
    }

    fn persist_stats(&mut self) {
        self.persist(ProfileUpdate {
            cycle_stats: Some(self.stats),
            ..ProfileUpdate::default()
        });
    }

    fn persist_cache(&mut self) {
        if self.scheduler.take_cache_dirty() {
            self.persist(ProfileUpdate {
                dialogue_cache: Some(self.scheduler.cache().clone()),
                ..ProfileUpdate::default()
            });
        }
    }

    /// Apply to the in-memory profile, then save. Failures are logged; the
    /// in-memory state stays authoritative and the next save catches up.
    fn persist(&mut self, update: ProfileUpdate) {
        update.clone().apply(&mut self.profile);
        let mut pending = std::mem::take(&mut self.unsaved);
        pending.merge(update);
        if let Err(e) = self.store.save(&pending) {
            tracing::warn!(error = %e, "profile save failed");
            self.unsaved = pending;
        }
    }
}
