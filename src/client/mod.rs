//! Resilient cache client.
//!
//! # Data Flow
//! ```text
//! caller → ResilientClient::get/set/delete/exists/expire
//!     → CircuitBreaker::admit(identity)
//!         Deny  → FallbackStore (fallback_used)
//!         Allow → ConnectionPool::borrow → remote command (socket timeout)
//!                   ok  → record_success, release healthy, commands_executed
//!                   err → record_failure, release unhealthy, commands_failed
//!                         → FallbackStore (fallback_used)
//! ```
//!
//! # Design Decisions
//! - Every operation is total: remote errors are absorbed and served from the
//!   fallback; only a fallback failure on top of that reaches the caller
//! - No globals: the composition root builds one client and shares it by `Arc`
//! - Successful remote writes drop the fallback copy of the key

mod value;

pub use value::CacheValue;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, RetryConfig};
use crate::error::{CacheError, Result};
use crate::fallback::{FallbackStore, MemoryFallback};
use crate::observability::{ClientMetrics, MetricsSink, MetricsSnapshot, NoopSink};
use crate::pool::{ConnectionPool, PoolStats};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::{BreakerStatus, CircuitBreaker, Decision, TrialGuard};
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::timeouts::with_timeout;
use crate::store::{Command, Connector, RedisConnector, Reply};

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Remote,
    Fallback,
}

/// A result tagged with the path that served it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served<T> {
    pub value: T,
    pub source: Source,
}

/// Circuit-breaker-guarded, pooled client with in-memory fallback.
pub struct ResilientClient {
    identity: String,
    breaker: Arc<CircuitBreaker<String>>,
    pool: Arc<ConnectionPool>,
    fallback: Arc<dyn FallbackStore>,
    metrics: Arc<ClientMetrics>,
    retries: RetryConfig,
}

impl ResilientClient {
    pub fn builder(config: CacheConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker<String>> {
        &self.breaker
    }

    pub fn breaker_status(&self) -> BreakerStatus {
        self.breaker.status(&self.identity)
    }

    /// Administrative override: close the circuit now.
    pub fn reset_breaker(&self) {
        self.breaker.force_reset(&self.identity);
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Direct remote ping through the pool, ignoring circuit state.
    pub async fn ping(&self) -> bool {
        self.pool.health_check().await
    }

    pub async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        Ok(self.get_raw(key).await?.map(CacheValue::decode))
    }

    /// Stored text without decoding.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.execute(Command::Get { key }).await?.value.into_value()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: impl Into<CacheValue>, ttl: Option<Duration>) -> Result<()> {
        let value = value.into().encode()?;
        self.execute(Command::Set { key, value, ttl }).await?.value.into_done()
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let value = serde_json::to_string(value)?;
        self.execute(Command::Set { key, value, ttl }).await?.value.into_done()
    }

    /// Returns the number of keys removed.
    pub async fn delete(&self, key: &str) -> Result<u64> {
        self.execute(Command::Delete { key }).await?.value.into_count()
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.execute(Command::Exists { key }).await?.value.into_flag()
    }

    /// Returns false when the key does not exist.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.execute(Command::Expire { key, ttl }).await?.value.into_flag()
    }

    /// Run one command through breaker, pool and fallback.
    pub async fn execute(&self, command: Command<'_>) -> Result<Served<Reply>> {
        let operation = command.name();
        let decision = self.breaker.admit(&self.identity);

        if decision == Decision::Deny {
            self.metrics.fallback_used(operation, "circuit_open");
            tracing::debug!(operation, key = ?command.key(), "Circuit open, serving from fallback");
            return match self.run_fallback(&command) {
                Ok(value) => Ok(Served {
                    value,
                    source: Source::Fallback,
                }),
                Err(e) => {
                    tracing::error!(operation, error = %e, "Fallback failed while circuit open");
                    Err(CacheError::CircuitOpen {
                        identity: self.identity.clone(),
                        fallback: Box::new(e),
                    })
                }
            };
        }

        let guard = TrialGuard::new(&*self.breaker, &self.identity, decision);
        let result = self.run_remote(&command).await;
        guard.disarm();

        match result {
            Ok(value) => {
                self.breaker.record_success(&self.identity);
                self.metrics.command_executed(operation);
                self.invalidate_fallback(&command);
                Ok(Served {
                    value,
                    source: Source::Remote,
                })
            }
            Err(primary) => {
                let transition = self.breaker.record_failure(&self.identity, &primary.to_string());
                if transition.is_some_and(|t| t.is_trip()) {
                    self.metrics.circuit_tripped(&self.identity);
                }
                self.metrics.command_failed(operation, primary.kind());
                self.metrics.fallback_used(operation, "remote_error");
                tracing::warn!(
                    operation,
                    key = ?command.key(),
                    error = %primary,
                    "Remote command failed, serving from fallback"
                );

                match self.run_fallback(&command) {
                    Ok(value) => Ok(Served {
                        value,
                        source: Source::Fallback,
                    }),
                    Err(fallback) => {
                        tracing::error!(
                            operation,
                            primary = %primary,
                            fallback = %fallback,
                            "Remote and fallback both failed"
                        );
                        Err(CacheError::FallbackExhausted {
                            primary: Box::new(primary),
                            fallback: Box::new(fallback),
                        })
                    }
                }
            }
        }
    }

    async fn run_remote(&self, command: &Command<'_>) -> Result<Reply> {
        let max_attempts = if self.pool.config().retry_on_timeout { 2 } else { 1 };
        let mut attempt = 1;
        loop {
            match self.remote_once(command).await {
                Err(CacheError::Timeout { .. }) if attempt < max_attempts => {
                    let delay = calculate_backoff(attempt, self.retries.base_delay_ms, self.retries.max_delay_ms);
                    tracing::info!(
                        operation = command.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Remote call timed out, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn remote_once(&self, command: &Command<'_>) -> Result<Reply> {
        let config = self.pool.config();
        let mut conn = self.pool.borrow(config.borrow_timeout()).await?;
        let result = with_timeout("remote call", config.socket_timeout(), conn.dispatch(command)).await;
        self.pool.release(conn, result.is_ok());
        result
    }

    fn run_fallback(&self, command: &Command<'_>) -> Result<Reply> {
        let fb = &self.fallback;
        match command {
            Command::Get { key } => fb.get(key).map(Reply::Value),
            Command::Set { key, value, ttl } => fb.set(key, value, *ttl).map(|_| Reply::Done),
            Command::Delete { key } => fb.delete(key).map(Reply::Count),
            Command::Exists { key } => fb.exists(key).map(Reply::Flag),
            Command::Expire { key, ttl } => fb.expire(key, *ttl).map(Reply::Flag),
            Command::Ping => Ok(Reply::Done),
        }
    }

    fn invalidate_fallback(&self, command: &Command<'_>) {
        if let Command::Set { key, .. } | Command::Delete { key } = command {
            if let Err(e) = self.fallback.delete(key) {
                tracing::debug!(key = %key, error = %e, "Failed to invalidate fallback entry");
            }
        }
    }

    /// Stop lending connections and close idle ones.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

/// Composition of a [`ResilientClient`] with injectable collaborators.
pub struct ClientBuilder {
    config: CacheConfig,
    connector: Option<Arc<dyn Connector>>,
    fallback: Option<Arc<dyn FallbackStore>>,
    breaker: Option<Arc<CircuitBreaker<String>>>,
    sink: Option<Arc<dyn MetricsSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ClientBuilder {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            connector: None,
            fallback: None,
            breaker: None,
            sink: None,
            clock: None,
        }
    }

    /// Remote store connector. Defaults to Redis at `remote.url`.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Fallback store. Defaults to a `MemoryFallback` sized from config.
    pub fn fallback(mut self, fallback: Arc<dyn FallbackStore>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Share an existing breaker (e.g. with other clients of the same store).
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker<String>>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Time source for the breaker and the default fallback store.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<ResilientClient> {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let metrics = Arc::new(ClientMetrics::new(
            self.sink.unwrap_or_else(|| Arc::new(NoopSink)),
        ));

        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(RedisConnector::new(&config.remote.url)?),
        };
        let fallback = self.fallback.unwrap_or_else(|| {
            Arc::new(MemoryFallback::with_clock(&config.fallback, clock.clone()))
        });
        let breaker = self.breaker.unwrap_or_else(|| {
            Arc::new(CircuitBreaker::with_clock(
                "cache_client",
                config.circuit_breaker.clone(),
                clock.clone(),
            ))
        });
        let pool = Arc::new(ConnectionPool::new(connector, config.pool.clone(), metrics.clone()));

        Ok(ResilientClient {
            identity: config.remote.identity.clone(),
            breaker,
            pool,
            fallback,
            metrics,
            retries: config.retries.clone(),
        })
    }
}
