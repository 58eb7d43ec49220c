//! Async driver for [`CompanionHost`].
//!
//! One task owns the host. It multiplexes:
//! - UI commands from an mpsc channel
//! - a 1 s countdown interval, alive only while the engine is running
//! - a hold sampler, alive only while the reset gesture is held
//! - remote calls and version checks spawned into a `JoinSet`
//!
//! Dropping out of the loop drops both timers and aborts outstanding
//! tasks, so nothing can mutate a discarded host.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::companion::{CompanionLine, LineGenerator, PendingRequest};
use crate::error::{CoreError, GenerationFailure};
use crate::events::Event;
use crate::host::{CompanionHost, Effect, HostStatus, Notice};
use crate::timer::CycleChoice;
use crate::version::VersionChecker;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// Requests from the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ToggleActive,
    Click,
    Distraction,
    SkipBreak,
    DismissReport,
    ChooseBreak(CycleChoice),
    SaveDiary { content: String, date: String },
    HoldBegin,
    HoldRelease,
    HoldCancel,
    AvatarSwap(String),
    AcknowledgeAlert,
    SetSound { enabled: bool, volume: u8 },
    Export(PathBuf),
    Status,
    // Operator controls
    ToggleExpiryAlert,
    ToggleCongested,
    TimeLeap,
    SetLevel(u32),
    ResetNetwork,
    Shutdown,
}

/// Output for the UI.
#[derive(Debug, Clone)]
pub enum Update {
    Event(Event),
    Line(CompanionLine),
    Notice(Notice),
    HoldProgress(f64),
    Status(Box<HostStatus>),
}

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Upper bound on one remote call; expiry counts as a transient failure.
    pub request_timeout: Duration,
    pub sample_interval: Duration,
    pub version_checker: Option<Arc<VersionChecker>>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            sample_interval: Duration::from_millis(16),
            version_checker: None,
        }
    }
}

enum TaskOutcome {
    Generated(PendingRequest, Result<String, GenerationFailure>),
    Version(Result<bool, CoreError>),
}

enum Wake {
    Command(Option<Command>),
    Countdown,
    Sample,
    Task(Result<TaskOutcome, JoinError>),
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Aborts the wrapped task when dropped, so aborting the outer task also
/// stops the remote call.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// One bounded remote call. The call runs in its own task so that a panic
/// in the generator comes back as a failure and the scheduler still
/// releases the in-flight slot for this kind.
async fn generate(
    generator: Arc<dyn LineGenerator>,
    request: &PendingRequest,
    timeout: Duration,
) -> Result<String, GenerationFailure> {
    let kind = request.kind;
    let context = request.context.clone();
    let call = tokio::spawn(async move {
        tokio::time::timeout(timeout, generator.generate_line(kind, &context)).await
    });
    let _guard = AbortOnDrop(call.abort_handle());
    match call.await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(GenerationFailure::Unknown("request timed out".into())),
        Err(e) => {
            tracing::warn!(%kind, error = %e, "generation task failed");
            Err(GenerationFailure::Unknown(format!("generation task failed: {e}")))
        }
    }
}

fn start_interval(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
    interval
}

/// Run until `Command::Shutdown` or the command channel closes, then hand
/// the host back.
pub async fn run(
    mut host: CompanionHost,
    options: RuntimeOptions,
    mut commands: mpsc::Receiver<Command>,
    updates: mpsc::UnboundedSender<Update>,
) -> CompanionHost {
    let mut countdown: Option<Interval> = None;
    let mut sampler: Option<Interval> = None;
    let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();

    loop {
        match (host.engine().is_active(), countdown.is_some()) {
            (true, false) => countdown = Some(start_interval(COUNTDOWN_PERIOD)),
            (false, true) => countdown = None,
            _ => {}
        }
        match (host.is_holding(), sampler.is_some()) {
            (true, false) => sampler = Some(start_interval(options.sample_interval)),
            (false, true) => sampler = None,
            _ => {}
        }

        let wake = tokio::select! {
            command = commands.recv() => Wake::Command(command),
            _ = next_tick(&mut countdown) => Wake::Countdown,
            _ = next_tick(&mut sampler) => Wake::Sample,
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => Wake::Task(joined),
        };

        let now = Utc::now();
        let effects = match wake {
            Wake::Command(None) | Wake::Command(Some(Command::Shutdown)) => break,
            Wake::Command(Some(command)) => apply_command(&mut host, command, &updates),
            Wake::Countdown => host.tick(now),
            Wake::Sample => {
                let (sample, effects) = host.hold_sample(now);
                let _ = updates.send(Update::HoldProgress(sample.progress));
                effects
            }
            Wake::Task(Ok(TaskOutcome::Generated(request, result))) => {
                host.complete_generation(request, result, now)
            }
            Wake::Task(Ok(TaskOutcome::Version(Ok(true)))) => host.mark_update_available(),
            Wake::Task(Ok(TaskOutcome::Version(Ok(false)))) => Vec::new(),
            Wake::Task(Ok(TaskOutcome::Version(Err(e)))) => {
                tracing::warn!(error = %e, "version check failed");
                Vec::new()
            }
            Wake::Task(Err(e)) => {
                tracing::warn!(error = %e, "background task failed");
                Vec::new()
            }
        };

        for effect in effects {
            match effect {
                Effect::Generate(request) => {
                    let generator = host.generator();
                    let timeout = options.request_timeout;
                    tasks.spawn(async move {
                        let result = generate(generator, &request, timeout).await;
                        TaskOutcome::Generated(request, result)
                    });
                }
                Effect::CheckVersion => {
                    if let Some(checker) = options.version_checker.clone() {
                        tasks.spawn(async move { TaskOutcome::Version(checker.check().await) });
                    }
                }
                Effect::Event(event) => {
                    let _ = updates.send(Update::Event(event));
                }
                Effect::Line(line) => {
                    let _ = updates.send(Update::Line(line));
                }
                Effect::Notice(notice) => {
                    let _ = updates.send(Update::Notice(notice));
                }
            }
        }
    }

    tasks.abort_all();
    tracing::debug!("runtime stopped");
    host
}

fn apply_command(
    host: &mut CompanionHost,
    command: Command,
    updates: &mpsc::UnboundedSender<Update>,
) -> Vec<Effect> {
    let now = Utc::now();
    match command {
        Command::ToggleActive => host.toggle_active(now),
        Command::Click => host.click(now),
        Command::Distraction => host.distraction(now),
        Command::SkipBreak => host.skip_break(now),
        Command::DismissReport => host.dismiss_report(now),
        Command::ChooseBreak(choice) => host.choose_break(choice, now),
        Command::SaveDiary { content, date } => host.save_diary(&content, &date, now),
        Command::HoldBegin => {
            host.hold_begin(now);
            Vec::new()
        }
        Command::HoldRelease => host.hold_release(now),
        Command::HoldCancel => {
            host.hold_cancel();
            Vec::new()
        }
        Command::AvatarSwap(src) => host.request_avatar_swap(src, now),
        Command::AcknowledgeAlert => {
            host.acknowledge_alert();
            Vec::new()
        }
        Command::SetSound { enabled, volume } => {
            host.set_sound(enabled, volume);
            Vec::new()
        }
        Command::Export(dir) => match host.export(&dir, Local::now()) {
            Ok(path) => vec![Effect::Notice(Notice::Exported { path })],
            Err(e) => vec![Effect::Notice(Notice::ExportFailed {
                message: e.to_string(),
            })],
        },
        Command::Status => {
            let _ = updates.send(Update::Status(Box::new(host.status())));
            Vec::new()
        }
        Command::ToggleExpiryAlert => {
            host.toggle_expiry_alert();
            Vec::new()
        }
        Command::ToggleCongested => {
            host.toggle_congested();
            Vec::new()
        }
        Command::TimeLeap => {
            host.time_leap(now);
            Vec::new()
        }
        Command::SetLevel(level) => {
            host.set_level(level);
            Vec::new()
        }
        Command::ResetNetwork => {
            host.reset_network();
            Vec::new()
        }
        Command::Shutdown => Vec::new(),
    }
}
