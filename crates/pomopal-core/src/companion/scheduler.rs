//! Companion response scheduler.
//!
//! Dispatch is split in two halves so a caller never holds scheduler state
//! across the remote call:
//!
//! 1. [`CompanionScheduler::dispatch`] decides between skipping, serving
//!    from cache/static lines, or issuing a [`PendingRequest`].
//! 2. [`CompanionScheduler::complete`] applies the outcome of that request
//!    (backoff, alert, cache push) and returns the line to display, unless
//!    a newer trigger or a phase change superseded it.
//!
//! [`CompanionScheduler::trigger_ai_response`] chains both for callers that
//! can await in place.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};

use super::cache::{DialogueCache, DEFAULT_CACHE_CAPACITY};
use super::cooldown::{InteractionCooldown, DEFAULT_COOLDOWN_MS};
use super::generator::{GenerationContext, LineGenerator};
use super::phrases;
use super::retry::{NetworkStatus, RetryPolicy, RetryState};
use super::TriggerKind;
use crate::error::GenerationFailure;
use crate::timer::RefillGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub cooldown_ms: u64,
    pub retry: RetryPolicy,
    pub cache_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            retry: RetryPolicy::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Sticky alert raised by a failed remote call. Only one is held at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceAlert {
    CredentialExpired,
    Congested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSource {
    Network,
    Cache,
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionLine {
    pub kind: TriggerKind,
    pub text: String,
    pub source: LineSource,
}

/// A remote call the caller must perform and hand back to
/// [`CompanionScheduler::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub kind: TriggerKind,
    pub ticket: u64,
    pub epoch: u64,
    pub context: GenerationContext,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Refill is blocked outside active focus; nothing happened.
    Blocked,
    /// A call for this kind is already outstanding; the trigger was dropped.
    InFlight,
    /// Served without the network.
    Served(CompanionLine),
    /// The caller must perform the remote call.
    Request(PendingRequest),
}

/// Outcome of [`CompanionScheduler::handle_interaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub blocked: bool,
    pub dispatch: Option<Dispatch>,
}

pub struct CompanionScheduler {
    generator: Arc<dyn LineGenerator>,
    config: SchedulerConfig,
    cache: DialogueCache,
    retry: RetryState,
    cooldown: InteractionCooldown,
    alert: Option<ServiceAlert>,
    message: Option<CompanionLine>,
    in_flight: HashSet<TriggerKind>,
    next_ticket: u64,
    display_ticket: u64,
    epoch: u64,
    suppressed_interactions: u32,
    cache_dirty: bool,
    rng: Mcg128Xsl64,
}

impl std::fmt::Debug for CompanionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanionScheduler")
            .field("model", &self.generator.model_name())
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("cooldown", &self.cooldown)
            .field("alert", &self.alert)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl CompanionScheduler {
    pub fn new(generator: Arc<dyn LineGenerator>, config: SchedulerConfig) -> Self {
        Self::with_rng(generator, config, Mcg128Xsl64::from_entropy())
    }

    /// Deterministic static-line selection, for tests and replays.
    pub fn with_seed(generator: Arc<dyn LineGenerator>, config: SchedulerConfig, seed: u64) -> Self {
        Self::with_rng(generator, config, Mcg128Xsl64::seed_from_u64(seed))
    }

    fn with_rng(generator: Arc<dyn LineGenerator>, config: SchedulerConfig, rng: Mcg128Xsl64) -> Self {
        Self {
            generator,
            config,
            cache: DialogueCache::default(),
            retry: RetryState::new(&config.retry),
            cooldown: InteractionCooldown::new(config.cooldown_ms),
            alert: None,
            message: None,
            in_flight: HashSet::new(),
            next_ticket: 0,
            display_ticket: 0,
            epoch: 0,
            suppressed_interactions: 0,
            cache_dirty: false,
            rng,
        }
    }

    /// Seed the cache from the persisted profile.
    pub fn restore_cache(&mut self, cache: DialogueCache) {
        self.cache = cache;
        self.cache_dirty = false;
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn cache(&self) -> &DialogueCache {
        &self.cache
    }

    pub fn generator(&self) -> Arc<dyn LineGenerator> {
        Arc::clone(&self.generator)
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// The line currently on display.
    pub fn message(&self) -> Option<&CompanionLine> {
        self.message.as_ref()
    }

    pub fn cooldown(&self) -> &InteractionCooldown {
        &self.cooldown
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.retry
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.retry.network_status()
    }

    pub fn alert(&self) -> Option<ServiceAlert> {
        self.alert
    }

    pub fn is_in_flight(&self, kind: TriggerKind) -> bool {
        self.in_flight.contains(&kind)
    }

    pub fn suppressed_interactions(&self) -> u32 {
        self.suppressed_interactions
    }

    /// True once if the cache changed since the last call.
    pub fn take_cache_dirty(&mut self) -> bool {
        std::mem::take(&mut self.cache_dirty)
    }

    /// Decide how to answer a trigger without touching the network.
    pub fn dispatch(
        &mut self,
        kind: TriggerKind,
        gate: &impl RefillGate,
        context: GenerationContext,
        now: DateTime<Utc>,
    ) -> Dispatch {
        if gate.should_block_refill() {
            tracing::debug!(%kind, "refill blocked outside focus");
            return Dispatch::Blocked;
        }

        if self.retry.is_circuit_open(now) {
            let ticket = self.take_ticket();
            self.display_ticket = ticket;
            let line = self.fallback_line(kind, context.level);
            tracing::debug!(%kind, source = ?line.source, "circuit open, serving locally");
            self.message = Some(line.clone());
            return Dispatch::Served(line);
        }

        if self.in_flight.contains(&kind) {
            tracing::debug!(%kind, "request already in flight, dropping trigger");
            return Dispatch::InFlight;
        }

        let ticket = self.take_ticket();
        self.display_ticket = ticket;
        self.in_flight.insert(kind);
        tracing::debug!(%kind, ticket, "issuing generation request");
        Dispatch::Request(PendingRequest {
            kind,
            ticket,
            epoch: self.epoch,
            context,
            issued_at: now,
        })
    }

    /// Apply the outcome of a request issued by [`Self::dispatch`].
    ///
    /// Returns the line to display, or `None` when the request was
    /// superseded. A superseded success still feeds the cache.
    pub fn complete(
        &mut self,
        request: PendingRequest,
        result: Result<String, GenerationFailure>,
        now: DateTime<Utc>,
    ) -> Option<CompanionLine> {
        let kind = request.kind;
        self.in_flight.remove(&kind);
        let superseded = request.ticket != self.display_ticket || request.epoch != self.epoch;

        let line = match result {
            Ok(text) => {
                self.retry.record_success(&self.config.retry);
                self.alert = None;
                if self.cache.push(kind, &text, self.config.cache_capacity) {
                    self.cache_dirty = true;
                }
                tracing::debug!(
                    %kind,
                    latency_ms = (now - request.issued_at).num_milliseconds(),
                    "generation succeeded"
                );
                if superseded {
                    return None;
                }
                CompanionLine {
                    kind,
                    text: text.trim().to_string(),
                    source: LineSource::Network,
                }
            }
            Err(failure) => {
                let until = self.retry.record_failure(&self.config.retry, now);
                self.raise_alert(&failure);
                tracing::warn!(
                    %kind,
                    error = %failure,
                    failures = self.retry.consecutive_failures(),
                    circuit_open_until = %until,
                    "generation failed"
                );
                if superseded {
                    return None;
                }
                self.fallback_line(kind, request.context.level)
            }
        };

        self.message = Some(line.clone());
        Some(line)
    }

    fn raise_alert(&mut self, failure: &GenerationFailure) {
        if !failure.is_transient() {
            self.alert = Some(ServiceAlert::CredentialExpired);
        } else if self.alert != Some(ServiceAlert::CredentialExpired) {
            self.alert = Some(ServiceAlert::Congested);
        }
    }

    fn take_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Most recent cached line for `kind`, else a static phrase.
    pub fn fallback_line(&mut self, kind: TriggerKind, level: u32) -> CompanionLine {
        if let Some(text) = self.cache.pop_recent(kind) {
            self.cache_dirty = true;
            return CompanionLine {
                kind,
                text,
                source: LineSource::Cache,
            };
        }
        CompanionLine {
            kind,
            text: phrases::pick(kind, level, &mut self.rng).to_string(),
            source: LineSource::Static,
        }
    }

    /// Cooldown gate for a poke at the companion.
    ///
    /// Accepted only during running focus with the cooldown elapsed; an
    /// accepted interaction re-arms the cooldown and dispatches a `click`.
    pub fn handle_interaction(
        &mut self,
        is_active: bool,
        is_break: bool,
        gate: &impl RefillGate,
        context: GenerationContext,
        now: DateTime<Utc>,
    ) -> Interaction {
        if !is_active || is_break || !self.cooldown.is_ready() {
            self.suppressed_interactions = self.suppressed_interactions.saturating_add(1);
            tracing::debug!(
                remaining_ms = self.cooldown.remaining_ms(),
                "interaction suppressed"
            );
            return Interaction {
                blocked: true,
                dispatch: None,
            };
        }
        self.cooldown.arm();
        let dispatch = self.dispatch(TriggerKind::Click, gate, context, now);
        Interaction {
            blocked: false,
            dispatch: Some(dispatch),
        }
    }

    pub fn trigger_cooldown(&mut self) {
        self.cooldown.arm();
    }

    pub fn advance_cooldown(&mut self, elapsed_ms: u64) {
        self.cooldown.advance(elapsed_ms);
    }

    pub fn reset_interactions(&mut self) {
        self.suppressed_interactions = 0;
    }

    /// Drop the display effect of every outstanding request and clear the
    /// current line. Called when leaving active focus.
    pub fn cancel_display(&mut self) {
        self.epoch += 1;
        self.message = None;
    }

    /// Take the alert; it stays raised until acknowledged.
    pub fn acknowledge_alert(&mut self) -> Option<ServiceAlert> {
        self.alert.take()
    }

    pub fn toggle_expiry_alert(&mut self) -> Option<ServiceAlert> {
        self.alert = match self.alert {
            Some(ServiceAlert::CredentialExpired) => None,
            _ => Some(ServiceAlert::CredentialExpired),
        };
        self.alert
    }

    pub fn toggle_congested(&mut self) -> Option<ServiceAlert> {
        self.alert = match self.alert {
            Some(ServiceAlert::Congested) => None,
            _ => Some(ServiceAlert::Congested),
        };
        self.alert
    }

    pub fn reset_retry(&mut self) {
        self.retry.reset(&self.config.retry);
    }

    /// Dispatch and, when needed, await the remote call in place.
    pub async fn trigger_ai_response(
        &mut self,
        kind: TriggerKind,
        gate: &impl RefillGate,
        context: GenerationContext,
        now: DateTime<Utc>,
    ) -> Option<CompanionLine> {
        match self.dispatch(kind, gate, context, now) {
            Dispatch::Blocked | Dispatch::InFlight => None,
            Dispatch::Served(line) => Some(line),
            Dispatch::Request(request) => {
                let generator = self.generator();
                let result = generator.generate_line(kind, &request.context).await;
                self.complete(request, result, Utc::now())
            }
        }
    }
}
