use std::sync::Arc;

use pomopal_core::feedback::NullFeedback;
use pomopal_core::timer::{TimerState, CYCLE_LENGTH};
use pomopal_core::{Config, HostStatus, ServiceAlert};

use super::open_host;

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let host = open_host(&config, Arc::new(NullFeedback))?;
    let status = host.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", format_status(&status));
    }
    Ok(())
}

fn state_name(state: TimerState) -> &'static str {
    match state {
        TimerState::FocusRunning => "focus",
        TimerState::FocusPaused => "focus (paused)",
        TimerState::BreakRunning => "break",
        TimerState::BreakPaused => "break (paused)",
        TimerState::AwaitingCycleChoice => "cycle complete",
    }
}

/// Multi-line human summary.
pub fn format_status(status: &HostStatus) -> String {
    let mut out = format!(
        "{}  {}  session {}/{}  cycle {:.0}%\n",
        status.clock,
        state_name(status.state),
        status.session_in_cycle,
        CYCLE_LENGTH,
        status.cycle_progress_pct,
    );
    out.push_str(&format!(
        "level {}  xp {}/{}  cycles {}\n",
        status.level, status.xp, status.max_xp_for_next_level, status.completed_cycles,
    ));
    out.push_str(&format!(
        "companion: {}  network {:?}  retry {}s",
        status.model,
        status.network_status,
        status.retry_delay_ms / 1000,
    ));
    if status.watching {
        out.push_str("  (watching)");
    }
    match status.alert {
        Some(ServiceAlert::CredentialExpired) => out.push_str("  [credential expired]"),
        Some(ServiceAlert::Congested) => out.push_str("  [busy]"),
        None => {}
    }
    if status.update_available {
        out.push_str("\nupdate available");
    }
    if let Some(line) = &status.message {
        out.push_str(&format!("\n  \"{}\"", line.text));
    }
    out
}
