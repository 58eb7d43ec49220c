//! # Pomopal Core Library
//!
//! This library provides the core logic for Pomopal, a focus timer with a
//! companion character that reacts to how the user works. Everything runs
//! through this crate; the `pomopal` CLI is a thin terminal layer over it.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a tick-driven focus/break cycle state machine that
//!   returns an [`Event`] for every transition
//! - **Companion Scheduler**: cooldown gating, dialogue cache, backoff and
//!   circuit window around a remote line generator
//! - **Host**: applies transitions, persists the profile and turns events
//!   into companion triggers
//! - **Runtime**: tokio driver owning the host, its timers and remote calls
//! - **Storage**: TOML configuration and the JSON profile document
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: core cycle state machine
//! - [`CompanionScheduler`]: response scheduling and resilience
//! - [`CompanionHost`]: coordinator used by front ends
//! - [`Config`]: application configuration management

pub mod companion;
pub mod error;
pub mod events;
pub mod feedback;
pub mod host;
pub mod profile;
pub mod runtime;
pub mod storage;
pub mod timer;
pub mod version;

pub use companion::{
    CompanionLine, CompanionScheduler, DialogueCache, GenerationContext, HttpLineGenerator,
    LineGenerator, ServiceAlert, TriggerKind,
};
pub use error::{ConfigError, CoreError, GenerationFailure, PersistenceError};
pub use events::Event;
pub use host::{CompanionHost, Effect, HostStatus, Notice};
pub use profile::{JsonProfileStore, ProfileSnapshot, ProfileStore, ProfileUpdate};
pub use runtime::{Command, RuntimeOptions, Update};
pub use storage::Config;
pub use timer::{CycleChoice, Mode, TimerEngine, TimerState};
