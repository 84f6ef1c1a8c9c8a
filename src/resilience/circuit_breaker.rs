//! Circuit breaker for peer protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: peer assumed down, calls fail fast without touching the network
//! - Half-Open: a bounded number of probes test whether the peer recovered
//!
//! # State Transitions
//! ```text
//! Closed    → Open:      consecutive_failures >= failure_threshold
//! Open      → Half-Open: now - last_failure > reset_timeout (that call is a probe)
//! Half-Open → Closed:    any success, all counters reset
//! Half-Open → Open:      failed probes reach half_open_max_calls
//! Half-Open → Half-Open: budget held by unreported calls for > reset_timeout
//! ```
//!
//! # Design Decisions
//! - Per-peer circuit breaker (not global), created lazily on first use
//! - Each record is updated under its map shard lock; no lock is ever held
//!   across a network call
//! - Probes carry the half-open epoch they were admitted in, so an outcome
//!   from an earlier half-open period cannot consume the current budget
//! - A half-open call whose caller went away hands its slot back via `release`

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Decision returned when asking to make a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed; call normally.
    Allowed,
    /// Half-open trial call admitted in the given epoch.
    Probe(u64),
    /// Breaker open or probe budget exhausted; do not call.
    Rejected,
}

impl Admission {
    pub fn is_permitted(&self) -> bool {
        !matches!(self, Admission::Rejected)
    }
}

/// Thresholds applied to every breaker.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_max_calls: u32,
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: Duration::from_secs(config.reset_timeout_secs),
            half_open_max_calls: config.half_open_max_calls.max(1),
        }
    }
}

/// State machine for a single peer.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    /// Failed probes in the current half-open period.
    half_open_probes: u32,
    /// Probes admitted in the current half-open period and not yet reported.
    probes_in_flight: u32,
    half_open_epoch: u64,
    half_open_since: Option<Instant>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            half_open_probes: 0,
            probes_in_flight: 0,
            half_open_epoch: 0,
            half_open_since: None,
        }
    }
}

impl CircuitBreaker {
    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    pub fn half_open_probe_count(&self) -> u32 {
        self.half_open_probes
    }

    /// Decide whether a call may proceed at `now`.
    pub fn admit(&mut self, settings: &BreakerSettings, now: Instant) -> Admission {
        match self.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                let cooled_down = self
                    .last_failure
                    .map(|at| now.saturating_duration_since(at) > settings.reset_timeout)
                    .unwrap_or(true);
                if cooled_down {
                    self.enter_half_open(now);
                    self.probes_in_flight = 1;
                    Admission::Probe(self.half_open_epoch)
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_probes + self.probes_in_flight < settings.half_open_max_calls {
                    self.probes_in_flight += 1;
                    Admission::Probe(self.half_open_epoch)
                } else if self.probes_in_flight > 0 && self.half_open_stalled(settings, now) {
                    // Unreported calls of a stalled period are written off.
                    self.enter_half_open(now);
                    self.probes_in_flight = 1;
                    Admission::Probe(self.half_open_epoch)
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Record a successful call. Returns the new state if it changed.
    pub fn on_success(&mut self, admission: Admission) -> Option<CircuitState> {
        self.release_probe(admission);
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen => {
                *self = Self {
                    half_open_epoch: self.half_open_epoch,
                    ..Self::default()
                };
                Some(CircuitState::Closed)
            }
            // Outcome of a call admitted before the circuit opened.
            CircuitState::Open => None,
        }
    }

    /// Record a failed call at `now`. Returns the new state if it changed.
    pub fn on_failure(
        &mut self,
        admission: Admission,
        settings: &BreakerSettings,
        now: Instant,
    ) -> Option<CircuitState> {
        let current_probe = self.release_probe(admission);
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_failure = Some(now);
                if self.consecutive_failures >= settings.failure_threshold {
                    self.state = CircuitState::Open;
                    Some(CircuitState::Open)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen if current_probe => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_failure = Some(now);
                self.half_open_probes += 1;
                if self.half_open_probes >= settings.half_open_max_calls {
                    self.state = CircuitState::Open;
                    self.half_open_probes = 0;
                    self.probes_in_flight = 0;
                    Some(CircuitState::Open)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => None,
        }
    }

    /// Give back the slot of a call that will never report an outcome.
    pub fn on_abandoned(&mut self, admission: Admission) {
        self.release_probe(admission);
    }

    fn enter_half_open(&mut self, now: Instant) {
        self.state = CircuitState::HalfOpen;
        self.half_open_probes = 0;
        self.probes_in_flight = 0;
        self.half_open_epoch += 1;
        self.half_open_since = Some(now);
    }

    fn half_open_stalled(&self, settings: &BreakerSettings, now: Instant) -> bool {
        self.half_open_since
            .is_some_and(|at| now.saturating_duration_since(at) > settings.reset_timeout)
    }

    /// Returns true if `admission` is a probe of the current half-open period.
    fn release_probe(&mut self, admission: Admission) -> bool {
        match admission {
            Admission::Probe(epoch)
                if epoch == self.half_open_epoch && self.state == CircuitState::HalfOpen =>
            {
                self.probes_in_flight = self.probes_in_flight.saturating_sub(1);
                true
            }
            _ => false,
        }
    }
}

/// Point-in-time view of one breaker, for status endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub peer: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_probe_count: u32,
    pub seconds_since_last_failure: Option<f64>,
}

/// Process-wide set of breakers, one per peer name.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
    settings: BreakerSettings,
}

impl CircuitBreakerRegistry {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            breakers: DashMap::new(),
            settings,
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(BreakerSettings::from(config))
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Ask whether a call to `peer` may proceed now.
    pub fn try_acquire(&self, peer: &str) -> Admission {
        self.try_acquire_at(peer, Instant::now())
    }

    pub fn try_acquire_at(&self, peer: &str, now: Instant) -> Admission {
        let mut breaker = self.breakers.entry(key(peer)).or_default();
        let before = breaker.state();
        let admission = breaker.admit(&self.settings, now);
        if breaker.state() != before {
            log_transition(peer, breaker.state());
        }
        admission
    }

    pub fn record_success(&self, peer: &str, admission: Admission) {
        let mut breaker = self.breakers.entry(key(peer)).or_default();
        if let Some(state) = breaker.on_success(admission) {
            log_transition(peer, state);
        }
    }

    pub fn record_failure(&self, peer: &str, admission: Admission) {
        self.record_failure_at(peer, admission, Instant::now())
    }

    pub fn record_failure_at(&self, peer: &str, admission: Admission, now: Instant) {
        let mut breaker = self.breakers.entry(key(peer)).or_default();
        if let Some(state) = breaker.on_failure(admission, &self.settings, now) {
            log_transition(peer, state);
            if state == CircuitState::Open {
                tracing::warn!(
                    peer = %peer,
                    failures = breaker.consecutive_failures(),
                    "Circuit opened"
                );
            }
        }
    }

    /// Hand back an admission whose call was cancelled before reporting.
    pub fn release(&self, peer: &str, admission: Admission) {
        if let Some(mut breaker) = self.breakers.get_mut(&key(peer)) {
            breaker.on_abandoned(admission);
        }
    }

    /// Copy of the breaker for `peer`, if it has ever been referenced.
    pub fn get(&self, peer: &str) -> Option<CircuitBreaker> {
        self.breakers.get(&key(peer)).map(|b| b.clone())
    }

    /// Snapshot every known breaker, sorted by peer name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let now = Instant::now();
        let mut out: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| {
                let b = entry.value();
                BreakerSnapshot {
                    peer: entry.key().clone(),
                    state: b.state(),
                    consecutive_failures: b.consecutive_failures(),
                    half_open_probe_count: b.half_open_probe_count(),
                    seconds_since_last_failure: b
                        .last_failure()
                        .map(|at| now.saturating_duration_since(at).as_secs_f64()),
                }
            })
            .collect();
        out.sort_by(|a, b| a.peer.cmp(&b.peer));
        out
    }
}

fn key(peer: &str) -> String {
    peer.trim().to_lowercase()
}

fn log_transition(peer: &str, to: CircuitState) {
    tracing::info!(peer = %peer, state = to.as_str(), "Circuit breaker transition");
    metrics::record_breaker_transition(peer, to.as_str());
}
