//! Breaker-guarded execution for arbitrary identities (e.g. agents).
//!
//! # Responsibilities
//! - Run caller-supplied async operations through a shared `CircuitBreaker<K>`
//! - Apply the caller's on-deny action (fallback closure or plain rejection)
//! - Notify an optional retry scheduler after failures and denials
//!
//! # Design Decisions
//! - The scheduler is a port, invoked fire-and-forget on a spawned task; its errors
//!   are logged and never reach the caller or the breaker
//! - The breaker state machine is identical to the one used by the cache client

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::resilience::circuit_breaker::{CircuitBreaker, TrialGuard};

/// Why a retry is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The operation ran and failed.
    Failed,
    /// The breaker denied the operation.
    CircuitOpen,
}

/// A retry request handed to the scheduler port.
#[derive(Debug, Clone)]
pub struct RetryRequest<K> {
    pub identity: K,
    pub reason: RetryReason,
    /// Suggested delay before the retry should run.
    pub retry_in: Duration,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("retry scheduling failed: {0}")]
pub struct SchedulerError(pub String);

/// External task-scheduling service used to enqueue retries.
#[async_trait]
pub trait RetryScheduler<K>: Send + Sync {
    async fn schedule_retry(&self, request: RetryRequest<K>) -> Result<(), SchedulerError>;
}

/// Error returned by [`GuardedExecutor::call`].
#[derive(Debug, thiserror::Error)]
pub enum GuardError<E> {
    #[error("circuit open, retry in {retry_in:?}")]
    CircuitOpen { retry_in: Duration },

    #[error("operation failed: {0}")]
    Operation(E),
}

/// Runs operations for many identities behind one breaker.
pub struct GuardedExecutor<K>
where
    K: Eq + Hash,
{
    breaker: Arc<CircuitBreaker<K>>,
    scheduler: Option<Arc<dyn RetryScheduler<K>>>,
}

impl<K> GuardedExecutor<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    pub fn new(breaker: Arc<CircuitBreaker<K>>) -> Self {
        Self {
            breaker,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn RetryScheduler<K>>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker<K>> {
        &self.breaker
    }

    /// Run `op` for `identity`, failing fast while the circuit is open.
    pub async fn call<T, E, F, Fut>(&self, identity: &K, op: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let decision = self.breaker.admit(identity);
        if !decision.is_allowed() {
            let retry_in = self.retry_in(identity);
            self.schedule(identity, RetryReason::CircuitOpen, retry_in, None);
            return Err(GuardError::CircuitOpen { retry_in });
        }

        let guard = TrialGuard::new(&*self.breaker, identity, decision);
        let result = op().await;
        guard.disarm();

        match result {
            Ok(value) => {
                self.breaker.record_success(identity);
                Ok(value)
            }
            Err(e) => {
                let message = e.to_string();
                self.breaker.record_failure(identity, &message);
                let retry_in = self.retry_in(identity);
                self.schedule(identity, RetryReason::Failed, retry_in, Some(message));
                Err(GuardError::Operation(e))
            }
        }
    }

    /// Like [`call`](Self::call), but runs `on_deny` instead of failing when the
    /// circuit is open.
    pub async fn call_or_else<T, E, F, Fut, D, DFut>(
        &self,
        identity: &K,
        op: F,
        on_deny: D,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        D: FnOnce() -> DFut,
        DFut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        match self.call(identity, op).await {
            Err(GuardError::CircuitOpen { .. }) => {
                tracing::debug!(identity = ?identity, "Circuit open, running on-deny action");
                on_deny().await.map_err(GuardError::Operation)
            }
            other => other,
        }
    }

    fn retry_in(&self, identity: &K) -> Duration {
        let status = self.breaker.status(identity);
        match status.retry_in_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::ZERO,
        }
    }

    fn schedule(&self, identity: &K, reason: RetryReason, retry_in: Duration, error: Option<String>) {
        let Some(scheduler) = self.scheduler.clone() else {
            return;
        };
        let request = RetryRequest {
            identity: identity.clone(),
            reason,
            retry_in,
            error,
        };
        tokio::spawn(async move {
            let identity = request.identity.clone();
            if let Err(e) = scheduler.schedule_retry(request).await {
                tracing::warn!(identity = ?identity, error = %e, "Failed to schedule retry");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::resilience::clock::ManualClock;
    use tokio::sync::mpsc;

    struct ChannelScheduler {
        tx: mpsc::UnboundedSender<RetryRequest<String>>,
        fail: bool,
    }

    #[async_trait]
    impl RetryScheduler<String> for ChannelScheduler {
        async fn schedule_retry(&self, request: RetryRequest<String>) -> Result<(), SchedulerError> {
            let _ = self.tx.send(request);
            if self.fail {
                Err(SchedulerError("queue unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn executor(fail_scheduler: bool) -> (GuardedExecutor<String>, mpsc::UnboundedReceiver<RetryRequest<String>>) {
        let config = CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout_secs: 30,
            ..CircuitBreakerConfig::default()
        };
        let breaker = Arc::new(CircuitBreaker::with_clock(
            "agents",
            config,
            Arc::new(ManualClock::new()),
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        let exec = GuardedExecutor::new(breaker).with_scheduler(Arc::new(ChannelScheduler {
            tx,
            fail: fail_scheduler,
        }));
        (exec, rx)
    }

    #[tokio::test]
    async fn test_failures_trip_and_schedule_retries() {
        let (exec, mut rx) = executor(false);
        let agent = "agent-7".to_string();

        for _ in 0..2 {
            let r: Result<(), _> = exec.call(&agent, || async { Err::<(), _>("llm timeout") }).await;
            assert!(matches!(r, Err(GuardError::Operation("llm timeout"))));
        }
        assert_eq!(exec.breaker().status(&agent).state, CircuitState::Open);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.reason, RetryReason::Failed);
        assert_eq!(first.error.as_deref(), Some("llm timeout"));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.retry_in, Duration::from_secs(30));

        let denied: Result<(), GuardError<&str>> = exec.call(&agent, || async { Ok(()) }).await;
        assert!(matches!(denied, Err(GuardError::CircuitOpen { .. })));
        let third = rx.recv().await.unwrap();
        assert_eq!(third.reason, RetryReason::CircuitOpen);
    }

    #[tokio::test]
    async fn test_on_deny_action_runs_when_open() {
        let (exec, _rx) = executor(false);
        let agent = "agent-1".to_string();
        for _ in 0..2 {
            let _ = exec.call(&agent, || async { Err::<u32, _>("boom") }).await;
        }

        let result = exec
            .call_or_else(&agent, || async { Ok::<u32, &str>(1) }, || async { Ok(99) })
            .await;
        assert_eq!(result.unwrap(), 99);
    }

    #[tokio::test]
    async fn test_scheduler_errors_are_swallowed() {
        let (exec, mut rx) = executor(true);
        let agent = "agent-2".to_string();
        let r = exec.call(&agent, || async { Err::<(), _>("boom") }).await;
        assert!(matches!(r, Err(GuardError::Operation("boom"))));
        assert!(rx.recv().await.is_some());

        let ok = exec.call(&agent, || async { Ok::<_, &str>(5) }).await;
        assert_eq!(ok.unwrap(), 5);
        assert_eq!(exec.breaker().status(&agent).failure_count, 0);
    }

    #[tokio::test]
    async fn test_cancelled_trial_does_not_wedge_breaker() {
        let clock = Arc::new(ManualClock::new());
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout_secs: 10,
            ..CircuitBreakerConfig::default()
        };
        let breaker = Arc::new(CircuitBreaker::with_clock("agents", config, clock.clone()));
        let exec: GuardedExecutor<String> = GuardedExecutor::new(breaker);
        let agent = "agent-9".to_string();

        let _ = exec.call(&agent, || async { Err::<(), _>("boom") }).await;
        clock.advance(Duration::from_secs(11));

        let slow = exec.call(&agent, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, &str>(())
        });
        assert!(tokio::time::timeout(Duration::from_millis(10), slow).await.is_err());
        assert_eq!(exec.breaker().status(&agent).state, CircuitState::Open);

        clock.advance(Duration::from_secs(100_000));
        let recovered = exec.call(&agent, || async { Ok::<_, &str>(7) }).await;
        assert_eq!(recovered.unwrap(), 7);
        assert_eq!(exec.breaker().status(&agent).state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_works_without_scheduler() {
        let breaker = Arc::new(CircuitBreaker::new("agents", CircuitBreakerConfig::default()));
        let exec: GuardedExecutor<u64> = GuardedExecutor::new(breaker);
        let r = exec.call(&42, || async { Err::<(), _>("boom") }).await;
        assert!(matches!(r, Err(GuardError::Operation(_))));
    }
}
