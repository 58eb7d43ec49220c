//! Interactive terminal driver.
//!
//! Reads one command per line from stdin, forwards it to the core runtime
//! and prints whatever the runtime reports back.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use pomopal_core::companion::{LineSource, ServiceAlert};
use pomopal_core::feedback::TerminalBell;
use pomopal_core::runtime::run as run_host;
use pomopal_core::timer::{format_clock, CycleChoice, Mode, CYCLE_LENGTH};
use pomopal_core::version::VersionChecker;
use pomopal_core::{Command, Config, Event, Notice, RuntimeOptions, Update};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::open_host;
use super::status::format_status;

const HELP: &str = "\
commands:
  <enter> | start | pause   toggle the timer
  click                     poke the companion
  back                      you wandered off and came back
  skip                      skip the current break
  dismiss                   close the cycle report
  long | short              pick the break after a full cycle
  diary <text>              save a diary entry from the report
  reset                     reset the current session
  full                      hold to restart the whole cycle
  avatar <image>            change the companion's picture
  ack                       dismiss the companion alert
  sound on [1-4] | off      session-end chime
  export [dir]              export the profile without credentials
  status                    show the current state
  debug expiry|congested|leap|network|level <n>
  quit";

/// One parsed input line.
#[derive(Debug, PartialEq)]
pub enum Input {
    Commands(Vec<Command>),
    Help,
    Quit,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let host = open_host(&config, Arc::new(TerminalBell))?;
    let options = runtime_options(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(drive(host, options));
    // The stdin reader may still be parked in a blocking read.
    runtime.shutdown_background();
    result
}

fn runtime_options(config: &Config) -> Result<RuntimeOptions, Box<dyn std::error::Error>> {
    let version_checker = if config.update.descriptor_url.is_empty() {
        None
    } else {
        Some(Arc::new(VersionChecker::new(
            &config.update.descriptor_url,
            std::time::Duration::from_secs(config.update.timeout_secs),
        )?))
    };
    Ok(RuntimeOptions {
        request_timeout: config.request_timeout(),
        sample_interval: config.sample_interval(),
        version_checker,
    })
}

async fn drive(
    host: pomopal_core::CompanionHost,
    options: RuntimeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let (commands, command_rx) = mpsc::channel(32);
    let (update_tx, mut updates) = mpsc::unbounded_channel();
    let driver = tokio::spawn(run_host(host, options, command_rx, update_tx));
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            if let Some(text) = render(&update) {
                println!("{text}");
            }
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    'input: while let Some(line) = lines.next_line().await? {
        let today = Local::now().format("%Y-%m-%d").to_string();
        match parse_command(&line, &today) {
            Ok(Input::Commands(batch)) => {
                for command in batch {
                    if commands.send(command).await.is_err() {
                        break 'input;
                    }
                }
            }
            Ok(Input::Help) => println!("{HELP}"),
            Ok(Input::Quit) => break,
            Err(message) => eprintln!("{message}"),
        }
    }

    drop(commands);
    let host = driver.await?;
    printer.await?;
    let status = host.status();
    println!("stopped at {} with {} cycles done", status.clock, status.completed_cycles);
    Ok(())
}

/// Parse a line of user input.
///
/// # Errors
///
/// Returns a message for unknown commands or bad arguments.
pub fn parse_command(line: &str, today: &str) -> Result<Input, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let one = |command: Command| -> Result<Input, String> { Ok(Input::Commands(vec![command])) };

    match word {
        "" | "s" | "start" | "pause" | "toggle" => one(Command::ToggleActive),
        "c" | "click" => one(Command::Click),
        "back" => one(Command::Distraction),
        "skip" => one(Command::SkipBreak),
        "dismiss" => one(Command::DismissReport),
        "long" => one(Command::ChooseBreak(CycleChoice::Long)),
        "short" => one(Command::ChooseBreak(CycleChoice::Short)),
        "diary" if !rest.is_empty() => one(Command::SaveDiary {
            content: rest.to_string(),
            date: today.to_string(),
        }),
        "diary" => Err("usage: diary <text>".into()),
        "reset" => Ok(Input::Commands(vec![Command::HoldBegin, Command::HoldRelease])),
        "full" | "hold" => one(Command::HoldBegin),
        "release" => one(Command::HoldRelease),
        "cancel" => one(Command::HoldCancel),
        "avatar" if !rest.is_empty() => one(Command::AvatarSwap(rest.to_string())),
        "avatar" => Err("usage: avatar <image>".into()),
        "ack" => one(Command::AcknowledgeAlert),
        "sound" => parse_sound(rest),
        "export" => one(Command::Export(PathBuf::from(if rest.is_empty() {
            "."
        } else {
            rest
        }))),
        "status" | "st" => one(Command::Status),
        "debug" => parse_debug(rest),
        "help" | "?" => Ok(Input::Help),
        "q" | "quit" | "exit" => Ok(Input::Quit),
        other => Err(format!("unknown command: {other} (try `help`)")),
    }
}

fn parse_sound(args: &str) -> Result<Input, String> {
    let mut parts = args.split_whitespace();
    let enabled = match parts.next() {
        Some("on") => true,
        Some("off") => false,
        _ => return Err("usage: sound on [1-4] | off".into()),
    };
    let volume = match parts.next() {
        Some(v) => v
            .parse::<u8>()
            .ok()
            .filter(|v| (1..=4).contains(v))
            .ok_or_else(|| format!("volume must be 1-4, got {v}"))?,
        None => 1,
    };
    Ok(Input::Commands(vec![Command::SetSound { enabled, volume }]))
}

fn parse_debug(args: &str) -> Result<Input, String> {
    let mut parts = args.split_whitespace();
    let command = match (parts.next(), parts.next()) {
        (Some("expiry"), None) => Command::ToggleExpiryAlert,
        (Some("congested"), None) => Command::ToggleCongested,
        (Some("leap"), None) => Command::TimeLeap,
        (Some("network"), None) => Command::ResetNetwork,
        (Some("level"), Some(level)) => Command::SetLevel(
            level
                .parse()
                .map_err(|_| format!("level must be a number, got {level}"))?,
        ),
        _ => return Err("usage: debug expiry|congested|leap|network|level <n>".into()),
    };
    Ok(Input::Commands(vec![command]))
}

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Focus => "focus",
        Mode::Break => "break",
    }
}

/// Text for an update, `None` for updates that are not printed.
pub fn render(update: &Update) -> Option<String> {
    match update {
        Update::Event(event) => render_event(event),
        Update::Line(line) => Some(match line.source {
            LineSource::Network => format!("  \"{}\"", line.text),
            LineSource::Cache | LineSource::Static => format!("  \"{}\" (offline)", line.text),
        }),
        Update::Notice(notice) => Some(render_notice(notice)),
        Update::HoldProgress(_) => None,
        Update::Status(status) => Some(format_status(status)),
    }
}

fn render_event(event: &Event) -> Option<String> {
    let text = match event {
        Event::TimerStarted {
            mode,
            remaining_secs,
            ..
        } => format!(
            "{} running, {} left",
            mode_name(*mode),
            format_clock(*remaining_secs)
        ),
        Event::TimerPaused {
            mode,
            remaining_secs,
            ..
        } => format!(
            "{} paused, {} left",
            mode_name(*mode),
            format_clock(*remaining_secs)
        ),
        Event::FocusCompleted {
            session_in_cycle,
            break_secs: Some(secs),
            ..
        } => format!(
            "focus {session_in_cycle}/{CYCLE_LENGTH} done, break for {}",
            format_clock(*secs)
        ),
        Event::FocusCompleted {
            break_secs: None, ..
        } => "cycle complete!".to_string(),
        Event::ReportDismissed { .. } => "pick your break: `long` or `short`".to_string(),
        Event::CycleCompleted {
            choice,
            break_secs,
            xp_awarded,
            ..
        } => format!(
            "{} break for {}, +{xp_awarded} xp",
            match choice {
                CycleChoice::Long => "long",
                CycleChoice::Short => "short",
            },
            format_clock(*break_secs)
        ),
        Event::BreakCompleted { skipped, .. } => {
            if *skipped {
                "break skipped, focus running".to_string()
            } else {
                "break over, focus running".to_string()
            }
        }
        Event::AvatarSwapped { image_src, .. } => format!("avatar is now {image_src}"),
        Event::TimerReset { .. } => return None,
    };
    Some(text)
}

fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::HoldHint => "keep holding to restart the whole cycle".to_string(),
        Notice::SessionReset => "session reset".to_string(),
        Notice::FullReset => "cycle restarted".to_string(),
        Notice::ReportReady { stats } => format!(
            "report: {} distractions, {} clicks. `diary <text>` to save, `dismiss` to continue",
            stats.distractions, stats.clicks
        ),
        Notice::DiarySaved { entries } => format!("diary saved ({entries} entries)"),
        Notice::LevelUp { level } => format!("level up! now level {level}"),
        Notice::Alert {
            alert: ServiceAlert::CredentialExpired,
        } => "companion credential expired, check your API key (`ack` to dismiss)".to_string(),
        Notice::Alert {
            alert: ServiceAlert::Congested,
        } => "companion service is busy, using saved lines (`ack` to dismiss)".to_string(),
        Notice::UpdateAvailable => "a new version is available".to_string(),
        Notice::Exported { path } => format!("exported to {}", path.display()),
        Notice::ExportFailed { message } => format!("export failed: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomopal_core::companion::{CompanionLine, TriggerKind};

    fn parse(line: &str) -> Input {
        parse_command(line, "2026-05-01").unwrap()
    }

    #[test]
    fn test_parse_timer_commands() {
        assert_eq!(parse(""), Input::Commands(vec![Command::ToggleActive]));
        assert_eq!(parse("  start "), Input::Commands(vec![Command::ToggleActive]));
        assert_eq!(
            parse("short"),
            Input::Commands(vec![Command::ChooseBreak(CycleChoice::Short)])
        );
        assert_eq!(
            parse("reset"),
            Input::Commands(vec![Command::HoldBegin, Command::HoldRelease])
        );
        assert_eq!(parse("quit"), Input::Quit);
        assert_eq!(parse("help"), Input::Help);
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(
            parse("diary  a good day "),
            Input::Commands(vec![Command::SaveDiary {
                content: "a good day".into(),
                date: "2026-05-01".into(),
            }])
        );
        assert_eq!(
            parse("sound on 3"),
            Input::Commands(vec![Command::SetSound {
                enabled: true,
                volume: 3
            }])
        );
        assert_eq!(
            parse("export /tmp/out"),
            Input::Commands(vec![Command::Export(PathBuf::from("/tmp/out"))])
        );
        assert_eq!(parse("debug level 7"), Input::Commands(vec![Command::SetLevel(7)]));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("diary", "d").is_err());
        assert!(parse_command("sound on 9", "d").is_err());
        assert!(parse_command("debug level x", "d").is_err());
        assert!(parse_command("dance", "d").is_err());
    }

    #[test]
    fn test_render_offline_line() {
        let update = Update::Line(CompanionLine {
            kind: TriggerKind::Click,
            text: "Hey!".into(),
            source: LineSource::Static,
        });
        assert_eq!(render(&update).unwrap(), "  \"Hey!\" (offline)");
        assert_eq!(render(&Update::HoldProgress(50.0)), None);
    }
}
