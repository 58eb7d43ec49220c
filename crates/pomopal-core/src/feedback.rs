//! Sound and haptic feedback at session boundaries.
//!
//! Playback goes through a process-wide audio context that is created
//! lazily once and activated only from direct user gestures. Feedback is
//! fire-and-forget: sinks swallow their own failures.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Master gain for volume levels 1..=4.
pub const VOLUME_MAP: [f32; 4] = [0.25, 0.5, 0.8, 1.0];

/// C5, E5, G5 with their offsets from the start of the chime.
pub const CHIME_NOTES: [(f32, u64); 3] = [(523.25, 0), (659.25, 100), (783.99, 200)];

/// Three 50 ms pulses in step with the chime, as `(offset_ms, duration_ms)`.
pub const HAPTIC_PATTERN: [(u64, u64); 3] = [(0, 50), (100, 50), (200, 50)];

const ATTACK_MS: u64 = 50;
const DECAY_MS: u64 = 800;

pub fn master_volume(level: u8) -> f32 {
    VOLUME_MAP[usize::from(level.clamp(1, 4) - 1)]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub freq_hz: f32,
    pub offset_ms: u64,
    pub attack_ms: u64,
    pub decay_ms: u64,
    pub gain: f32,
}

/// The success chime at `level`.
pub fn chime(level: u8) -> [Tone; 3] {
    let gain = master_volume(level);
    CHIME_NOTES.map(|(freq_hz, offset_ms)| Tone {
        freq_hz,
        offset_ms,
        attack_ms: ATTACK_MS,
        decay_ms: DECAY_MS,
        gain,
    })
}

/// Process-wide playback context.
#[derive(Debug, Default)]
pub struct AudioContext {
    active: AtomicBool,
    activations: AtomicUsize,
}

impl AudioContext {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Idempotent. Returns true only for the call that activated it.
    pub fn ensure_active(&self) -> bool {
        let activated = !self.active.swap(true, Ordering::SeqCst);
        if activated {
            self.activations.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("audio context activated");
        }
        activated
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }
}

pub fn audio_context() -> &'static AudioContext {
    static CONTEXT: OnceLock<AudioContext> = OnceLock::new();
    CONTEXT.get_or_init(AudioContext::default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackSettings {
    pub enabled: bool,
    /// 1..=4
    pub volume: u8,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            volume: 1,
        }
    }
}

/// Notification collaborator.
pub trait FeedbackSink: Send + Sync {
    fn play_feedback(&self, settings: FeedbackSettings);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullFeedback;

impl FeedbackSink for NullFeedback {
    fn play_feedback(&self, _settings: FeedbackSettings) {}
}

/// Rings the terminal bell once per chime note.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalBell;

impl FeedbackSink for TerminalBell {
    fn play_feedback(&self, settings: FeedbackSettings) {
        if !settings.enabled {
            return;
        }
        let context = audio_context();
        context.ensure_active();

        let tones = chime(settings.volume);
        tracing::debug!(gain = tones[0].gain, pulses = HAPTIC_PATTERN.len(), "playing chime");
        let mut stderr = std::io::stderr().lock();
        for _ in tones {
            if let Err(e) = stderr.write_all(b"\x07") {
                tracing::debug!(error = %e, "bell write failed");
                return;
            }
        }
        let _ = stderr.flush();
    }
}
