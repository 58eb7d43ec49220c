//! Integration tests for `CompanionHost`.
//!
//! The host is exercised synchronously: every call returns its effects, and
//! the remote calls it asks for are answered by hand through
//! `complete_generation`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, Utc};
use pomopal_core::companion::{
    CompanionScheduler, GenerationContext, LineGenerator, LineSource, ServiceAlert, TriggerKind,
};
use pomopal_core::feedback::NullFeedback;
use pomopal_core::profile::{MemoryProfileStore, ProfileSnapshot, ProfileStore, DIARY_CAPACITY};
use pomopal_core::timer::{CycleChoice, TimerState};
use pomopal_core::{CompanionHost, Config, Effect, Event, GenerationFailure, Notice};

struct Silent;

#[async_trait]
impl LineGenerator for Silent {
    async fn generate_line(
        &self,
        _kind: TriggerKind,
        _context: &GenerationContext,
    ) -> Result<String, GenerationFailure> {
        Err(GenerationFailure::Unknown("not used".into()))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.timer.focus_minutes = 1;
    config.timer.short_break_minutes = 1;
    config
}

fn host_with(profile: ProfileSnapshot) -> (CompanionHost, Arc<MemoryProfileStore>) {
    let config = test_config();
    let store = Arc::new(MemoryProfileStore::new(profile.clone()));
    let scheduler = CompanionScheduler::with_seed(Arc::new(Silent), config.scheduler_config(), 9);
    let host = CompanionHost::with_scheduler(
        &config,
        profile,
        store.clone(),
        scheduler,
        Arc::new(NullFeedback),
    );
    (host, store)
}

fn host() -> (CompanionHost, Arc<MemoryProfileStore>) {
    host_with(ProfileSnapshot {
        name: "Miso".into(),
        api_key: "secret-key".into(),
        ..ProfileSnapshot::default()
    })
}

/// Tick until the current phase completes and return the effects of that tick.
fn finish_phase(host: &mut CompanionHost) -> Vec<Effect> {
    for _ in 0..10_000 {
        let effects = host.tick(Utc::now());
        if effects.iter().any(|e| matches!(e, Effect::Event(_))) {
            return effects;
        }
    }
    panic!("phase never completed");
}

fn generate_requests(effects: &[Effect]) -> Vec<TriggerKind> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Generate(request) => Some(request.kind),
            _ => None,
        })
        .collect()
}

fn drive_to_cycle_choice(host: &mut CompanionHost) {
    host.toggle_active(Utc::now());
    for _ in 0..4 {
        finish_phase(host);
        if host.engine().state() == TimerState::BreakRunning {
            finish_phase(host);
        }
    }
    assert_eq!(host.engine().state(), TimerState::AwaitingCycleChoice);
}

#[test]
fn test_start_issues_start_request_and_arms_cooldown() {
    let (mut host, _) = host();
    let effects = host.toggle_active(Utc::now());

    assert!(matches!(
        effects.first(),
        Some(Effect::Event(Event::TimerStarted { .. }))
    ));
    assert_eq!(generate_requests(&effects), vec![TriggerKind::Start]);
    assert!(host.scheduler().cooldown().remaining_ms() > 0);
}

#[test]
fn test_completed_generation_is_displayed() {
    let (mut host, store) = host();
    let effects = host.toggle_active(Utc::now());
    let request = effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Generate(request) => Some(request),
            _ => None,
        })
        .unwrap();

    let effects = host.complete_generation(request, Ok("Let's go!".into()), Utc::now());
    match effects.as_slice() {
        [Effect::Line(line)] => {
            assert_eq!(line.text, "Let's go!");
            assert_eq!(line.source, LineSource::Network);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(host.status().message.unwrap().text, "Let's go!");
    assert_eq!(store.load().unwrap().dialogue_cache.start, vec!["Let's go!"]);
}

#[test]
fn test_click_gated_until_cooldown_drains() {
    let (mut host, _) = host();
    host.toggle_active(Utc::now());

    assert!(host.click(Utc::now()).is_empty());
    assert_eq!(host.stats().clicks, 0);

    for _ in 0..20 {
        host.tick(Utc::now());
    }
    let effects = host.click(Utc::now());
    assert_eq!(generate_requests(&effects), vec![TriggerKind::Click]);
    assert_eq!(host.stats().clicks, 1);
}

#[test]
fn test_distraction_counts_only_during_running_focus() {
    let (mut host, _) = host();
    assert!(host.distraction(Utc::now()).is_empty());
    assert_eq!(host.stats().distractions, 0);

    host.toggle_active(Utc::now());
    let effects = host.distraction(Utc::now());
    assert_eq!(generate_requests(&effects), vec![TriggerKind::Scolding]);
    assert_eq!(host.stats().distractions, 1);
}

#[test]
fn test_focus_completion_awards_xp_and_checks_version() {
    let (mut host, store) = host();
    host.toggle_active(Utc::now());

    let effects = finish_phase(&mut host);
    assert!(matches!(
        effects.first(),
        Some(Effect::Event(Event::FocusCompleted {
            session_in_cycle: 1,
            ..
        }))
    ));
    assert!(effects.contains(&Effect::CheckVersion));
    assert_eq!(host.engine().state(), TimerState::BreakRunning);

    let saved = store.load().unwrap();
    assert_eq!(saved.xp, 10);
    assert_eq!(saved.total_focus_minutes, 1);
    assert_eq!(saved.saved_is_break, Some(true));
    assert_eq!(saved.saved_session_in_cycle, Some(1));
}

#[test]
fn test_cycle_report_then_short_choice() {
    let (mut host, store) = host();
    drive_to_cycle_choice(&mut host);
    assert_eq!(host.profile().xp, 40);

    assert!(host.choose_break(CycleChoice::Short, Utc::now()).is_empty());
    host.dismiss_report(Utc::now());
    let effects = host.choose_break(CycleChoice::Short, Utc::now());
    assert!(matches!(
        effects.first(),
        Some(Effect::Event(Event::CycleCompleted {
            xp_awarded: 30,
            ..
        }))
    ));
    assert_eq!(host.engine().state(), TimerState::BreakRunning);
    assert_eq!(host.engine().time_left_secs(), 300);

    let saved = store.load().unwrap();
    assert_eq!(saved.xp, 70);
    assert_eq!(saved.total_completed_cycles, 1);
    assert_eq!(saved.saved_session_in_cycle, Some(0));
}

#[test]
fn test_level_up_is_announced() {
    let (mut host, _) = host_with(ProfileSnapshot {
        xp: 95,
        ..ProfileSnapshot::default()
    });
    host.toggle_active(Utc::now());

    let effects = finish_phase(&mut host);
    assert!(effects.contains(&Effect::Notice(Notice::LevelUp { level: 2 })));
    let profile = host.profile();
    assert_eq!(profile.level, 2);
    assert_eq!(profile.xp, 5);
    assert_eq!(profile.max_xp_for_next_level, 200);
}

#[test]
fn test_diary_only_while_report_pending_and_capped() {
    let (mut host, store) = host();
    assert!(host.save_diary("too early", "2026-01-01", Utc::now()).is_empty());

    drive_to_cycle_choice(&mut host);
    for i in 0..12 {
        let effects = host.save_diary(&format!("entry {i}"), "2026-01-01", Utc::now());
        assert_eq!(
            effects,
            vec![Effect::Notice(Notice::DiarySaved {
                entries: (i + 1).min(DIARY_CAPACITY)
            })]
        );
    }
    assert!(host.save_diary("   ", "2026-01-01", Utc::now()).is_empty());

    let diary = store.load().unwrap().diary_history;
    assert_eq!(diary.len(), DIARY_CAPACITY);
    assert_eq!(diary[0].content, "entry 11");
    assert_eq!(diary[DIARY_CAPACITY - 1].content, "entry 2");
}

#[test]
fn test_dismissing_report_clears_stats() {
    let (mut host, _) = host();
    host.toggle_active(Utc::now());
    host.distraction(Utc::now());
    drive_to_cycle_choice_from_running(&mut host);
    assert_eq!(host.stats().distractions, 1);

    host.dismiss_report(Utc::now());
    assert_eq!(host.stats().distractions, 0);
    assert_eq!(host.profile().cycle_stats.distractions, 0);
}

fn drive_to_cycle_choice_from_running(host: &mut CompanionHost) {
    while host.engine().state() != TimerState::AwaitingCycleChoice {
        finish_phase(host);
    }
}

#[test]
fn test_alert_waits_for_break() {
    let (mut host, _) = host();
    host.toggle_active(Utc::now());
    host.toggle_expiry_alert();
    assert_eq!(host.status().alert, None);

    let effects = finish_phase(&mut host);
    assert!(effects.contains(&Effect::Notice(Notice::Alert {
        alert: ServiceAlert::CredentialExpired
    })));
    assert_eq!(host.status().alert, Some(ServiceAlert::CredentialExpired));

    assert_eq!(
        host.acknowledge_alert(),
        Some(ServiceAlert::CredentialExpired)
    );
    assert_eq!(host.status().alert, None);
}

#[test]
fn test_failed_save_never_blocks_and_catches_up() {
    let (mut host, store) = host();
    host.toggle_active(Utc::now());
    store.set_fail_writes(true);

    finish_phase(&mut host);
    assert_eq!(host.engine().state(), TimerState::BreakRunning);
    assert_eq!(host.profile().xp, 10);
    assert_eq!(store.load().unwrap().xp, 0);

    store.set_fail_writes(false);
    host.tick(Utc::now());
    let saved = store.load().unwrap();
    assert_eq!(saved.xp, 10);
    assert_eq!(saved.total_focus_minutes, 1);
}

#[test]
fn test_avatar_swap_deferred_through_break() {
    let (mut host, store) = host();
    host.toggle_active(Utc::now());
    finish_phase(&mut host);

    assert!(host.request_avatar_swap("new.png".into(), Utc::now()).is_empty());
    assert_eq!(
        store.load().unwrap().pending_image_src.as_deref(),
        Some("new.png")
    );
    assert_eq!(host.status().avatar, None);

    host.skip_break(Utc::now());
    let saved = store.load().unwrap();
    assert_eq!(saved.image_src.as_deref(), Some("new.png"));
    assert_eq!(saved.pending_image_src, None);
    assert_eq!(host.status().avatar.as_deref(), Some("new.png"));
}

#[test]
fn test_full_reset_through_hold() {
    let (mut host, _) = host();
    host.toggle_active(Utc::now());
    finish_phase(&mut host);
    host.skip_break(Utc::now());
    assert_eq!(host.engine().session_in_cycle(), 1);

    let start = Utc::now();
    assert!(host.hold_begin(start));
    let effects = host.hold_release(start + chrono::Duration::milliseconds(2_500));
    assert!(effects.contains(&Effect::Notice(Notice::FullReset)));
    assert_eq!(host.engine().state(), TimerState::FocusPaused);
    assert_eq!(host.engine().session_in_cycle(), 0);
    assert!(!host.is_holding());
}

#[test]
fn test_export_omits_credential() {
    let (host, _) = host();
    let dir = tempfile::tempdir().unwrap();

    let path = host.export(dir.path(), Local::now()).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("Miso_"));
    assert!(name.ends_with(".json"));

    let body = std::fs::read_to_string(&path).unwrap();
    assert!(!body.contains("secret-key"));
    assert!(!body.contains("apiKey"));
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["name"], "Miso");
}

#[test]
fn test_restore_resumes_break() {
    let (host, _) = host_with(ProfileSnapshot {
        saved_time_left: Some(42),
        saved_is_active: Some(false),
        saved_is_break: Some(true),
        saved_session_in_cycle: Some(2),
        ..ProfileSnapshot::default()
    });
    let status = host.status();
    assert_eq!(status.state, TimerState::BreakPaused);
    assert_eq!(status.time_left_secs, 42);
    assert_eq!(status.clock, "00:42");
    assert_eq!(status.session_in_cycle, 2);
}
