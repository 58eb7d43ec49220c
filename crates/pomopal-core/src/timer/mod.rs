mod engine;
mod hold;

pub use engine::{
    format_clock, CycleChoice, CyclePlan, Mode, RefillGate, SessionSnapshot, TimerEngine,
    TimerState, CYCLE_LENGTH, TIME_LEAP_SECS,
};
pub use hold::{HoldOutcome, HoldSample, HoldThresholds, ResetHold};
