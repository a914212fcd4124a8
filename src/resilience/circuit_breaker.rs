//! Circuit breaker for remote dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through, failures are counted
//! - Open: dependency assumed down, calls are denied until the recovery deadline
//! - Half-Open: a bounded number of trial calls test whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold (base recovery timeout)
//! Open → Half-Open: first admit() at/after next_attempt_time (that caller gets the trial)
//! Half-Open → Closed: trial succeeds (count and recovery timeout reset)
//! Half-Open → Open: trial fails (recovery timeout grows, capped)
//! ```
//!
//! # Design Decisions
//! - Generic over the protected identity: one breaker serves a singleton remote store
//!   or a whole population of agents
//! - One record per identity behind its own mutex; identities never block each other
//! - The mutex is never held across an await; callers lock, decide, unlock, then run
//! - Decisions are a pure function of the record and the injected clock (no jitter)

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::resilience::backoff::next_recovery_timeout;
use crate::resilience::clock::{Clock, SystemClock};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

/// Outcome of [`CircuitBreaker::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Closed: proceed normally.
    Allow,
    /// Half-open trial: proceed, and the outcome decides the next state.
    AllowTrial,
    /// Short-circuit: do not touch the dependency.
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        !matches!(self, Decision::Deny)
    }
}

/// A state change caused by a recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

impl Transition {
    /// True when the breaker moved into Open.
    pub fn is_trip(&self) -> bool {
        self.to == CircuitState::Open
    }
}

#[derive(Debug)]
struct BreakerRecord {
    state: CircuitState,
    failure_count: u32,
    recovery_timeout: Duration,
    last_failure_time: Option<Instant>,
    next_attempt_time: Option<Instant>,
    trials_in_flight: u32,
    trips: u64,
    last_error: Option<String>,
}

impl BreakerRecord {
    fn new(base_recovery: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            recovery_timeout: base_recovery,
            last_failure_time: None,
            next_attempt_time: None,
            trials_in_flight: 0,
            trips: 0,
            last_error: None,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.next_attempt_time = Some(now + self.recovery_timeout);
        self.trials_in_flight = 0;
        self.trips += 1;
    }

    fn close(&mut self, base_recovery: Duration) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.recovery_timeout = base_recovery;
        self.next_attempt_time = None;
        self.trials_in_flight = 0;
    }

    fn snapshot(&self, now: Instant, failure_threshold: u32) -> BreakerStatus {
        BreakerStatus {
            state: self.state,
            failure_count: self.failure_count,
            failure_threshold,
            recovery_timeout_ms: self.recovery_timeout.as_millis() as u64,
            retry_in_ms: self
                .next_attempt_time
                .map(|t| t.saturating_duration_since(now).as_millis() as u64),
            since_last_failure_ms: self
                .last_failure_time
                .map(|t| now.saturating_duration_since(t).as_millis() as u64),
            trips: self.trips,
            last_error: self.last_error.clone(),
            next_attempt_time: self.next_attempt_time,
        }
    }
}

/// Read-only snapshot of one identity's breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    /// Time left until the next trial may be admitted.
    pub retry_in_ms: Option<u64>,
    pub since_last_failure_ms: Option<u64>,
    /// Number of transitions into Open.
    pub trips: u64,
    pub last_error: Option<String>,
    #[serde(skip)]
    pub next_attempt_time: Option<Instant>,
}

/// Per-identity circuit breaker.
pub struct CircuitBreaker<K>
where
    K: Eq + Hash,
{
    name: String,
    config: CircuitBreakerConfig,
    records: DashMap<K, Arc<Mutex<BreakerRecord>>>,
    clock: Arc<dyn Clock>,
}

impl<K> fmt::Debug for CircuitBreaker<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("identities", &self.records.len())
            .finish()
    }
}

impl<K> CircuitBreaker<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Create a breaker on the system clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name = name.into();
        tracing::info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            recovery_timeout_secs = config.recovery_timeout_secs,
            max_recovery_timeout_secs = config.max_recovery_timeout_secs,
            backoff_multiplier = config.backoff_multiplier,
            "Circuit breaker initialized"
        );
        Self {
            name,
            config,
            records: DashMap::new(),
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn base_recovery(&self) -> Duration {
        self.config.recovery_timeout().min(self.config.max_recovery_timeout())
    }

    fn record(&self, identity: &K) -> Arc<Mutex<BreakerRecord>> {
        if let Some(existing) = self.records.get(identity) {
            return existing.value().clone();
        }
        let base = self.base_recovery();
        self.records
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(Mutex::new(BreakerRecord::new(base))))
            .value()
            .clone()
    }

    /// Decide whether a call for `identity` may proceed.
    pub fn admit(&self, identity: &K) -> Decision {
        let record = self.record(identity);
        let now = self.clock.now();
        let mut r = record.lock();
        let state = r.state;
        let next_attempt = r.next_attempt_time;

        match state {
            CircuitState::Closed => Decision::Allow,
            CircuitState::Open => match next_attempt {
                Some(next) if now < next => Decision::Deny,
                _ => {
                    r.state = CircuitState::HalfOpen;
                    r.trials_in_flight = 1;
                    drop(r);
                    tracing::info!(
                        component = %self.name,
                        identity = ?identity,
                        "Circuit half-open, admitting trial call"
                    );
                    Decision::AllowTrial
                }
            },
            CircuitState::HalfOpen => {
                if r.trials_in_flight < self.config.half_open_max_trials.max(1) {
                    r.trials_in_flight += 1;
                    Decision::AllowTrial
                } else {
                    Decision::Deny
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, identity: &K) -> Option<Transition> {
        let record = self.record(identity);
        let mut r = record.lock();
        let state = r.state;

        match state {
            CircuitState::HalfOpen => {
                r.close(self.base_recovery());
                drop(r);
                tracing::info!(
                    component = %self.name,
                    identity = ?identity,
                    "Trial succeeded, circuit closed"
                );
                Some(Transition {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Closed,
                })
            }
            CircuitState::Closed => {
                if r.failure_count != 0 {
                    r.failure_count = 0;
                }
                None
            }
            // Late result from a call admitted before the trip.
            CircuitState::Open => None,
        }
    }

    /// Record a failed call. `error` is kept for status reporting.
    pub fn record_failure(&self, identity: &K, error: &str) -> Option<Transition> {
        let record = self.record(identity);
        let now = self.clock.now();
        let mut r = record.lock();

        r.failure_count = r.failure_count.saturating_add(1);
        r.last_failure_time = Some(now);
        r.last_error = Some(error.to_string());

        let state = r.state;
        let transition = match state {
            CircuitState::HalfOpen => {
                r.recovery_timeout = next_recovery_timeout(
                    r.recovery_timeout,
                    self.config.backoff_multiplier,
                    self.config.max_recovery_timeout(),
                );
                r.open(now);
                Some(Transition {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Open,
                })
            }
            CircuitState::Closed if r.failure_count >= self.config.failure_threshold => {
                r.recovery_timeout = self.base_recovery();
                r.open(now);
                Some(Transition {
                    from: CircuitState::Closed,
                    to: CircuitState::Open,
                })
            }
            _ => None,
        };
        let failure_count = r.failure_count;
        let recovery_timeout = r.recovery_timeout;
        drop(r);

        if let Some(t) = transition {
            tracing::warn!(
                component = %self.name,
                identity = ?identity,
                from = %t.from,
                failure_count,
                recovery_timeout_ms = recovery_timeout.as_millis() as u64,
                error = %error,
                "Circuit opened"
            );
        } else {
            tracing::debug!(
                component = %self.name,
                identity = ?identity,
                failure_count,
                error = %error,
                "Failure recorded"
            );
        }
        transition
    }

    /// Snapshot for `identity`. Unknown identities report a fresh Closed record.
    pub fn status(&self, identity: &K) -> BreakerStatus {
        let now = self.clock.now();
        match self.records.get(identity) {
            Some(record) => record.value().lock().snapshot(now, self.config.failure_threshold),
            None => BreakerRecord::new(self.base_recovery())
                .snapshot(now, self.config.failure_threshold),
        }
    }

    /// Snapshot of every identity seen so far.
    pub fn statuses(&self) -> Vec<(K, BreakerStatus)> {
        let now = self.clock.now();
        self.records
            .iter()
            .map(|entry| {
                let status = entry.value().lock().snapshot(now, self.config.failure_threshold);
                (entry.key().clone(), status)
            })
            .collect()
    }

    /// Administrative override back to Closed with cleared timers.
    pub fn force_reset(&self, identity: &K) {
        if let Some(record) = self.records.get(identity) {
            let mut r = record.value().lock();
            r.close(self.base_recovery());
            r.last_failure_time = None;
            r.last_error = None;
        }
        tracing::info!(component = %self.name, identity = ?identity, "Circuit force reset");
    }

    pub fn reset_all(&self) {
        for entry in self.records.iter() {
            let mut r = entry.value().lock();
            r.close(self.base_recovery());
            r.last_failure_time = None;
            r.last_error = None;
        }
        tracing::info!(component = %self.name, "All circuits force reset");
    }
}

/// Resolves an admitted half-open trial as a failure unless disarmed.
///
/// Held across the trial call so a dropped future, an outer timeout or a panic
/// in the operation cannot leave the identity half-open with its trial slot taken.
pub(crate) struct TrialGuard<'a, K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    breaker: &'a CircuitBreaker<K>,
    identity: &'a K,
    armed: bool,
}

impl<'a, K> TrialGuard<'a, K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Armed only for `Decision::AllowTrial`.
    pub(crate) fn new(breaker: &'a CircuitBreaker<K>, identity: &'a K, decision: Decision) -> Self {
        Self {
            breaker,
            identity,
            armed: decision == Decision::AllowTrial,
        }
    }

    /// The caller will record the outcome itself.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl<K> Drop for TrialGuard<'_, K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                component = %self.breaker.name,
                identity = ?self.identity,
                "Half-open trial abandoned"
            );
            self.breaker.record_failure(self.identity, "trial call abandoned");
        }
    }
}
