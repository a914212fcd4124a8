//! Shared utilities for integration tests.
//!
//! `MockRemote` is an in-memory stand-in for the remote store with failure
//! injection and call counting; `FailingFallback` is a fallback that never works.

#![allow(dead_code)]

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use resilient_cache::config::CacheConfig;
use resilient_cache::error::{CacheError, Result};
use resilient_cache::fallback::FallbackStore;
use resilient_cache::resilience::ManualClock;
use resilient_cache::store::{Connector, StoreConnection};
use resilient_cache::ResilientClient;

#[derive(Default)]
pub struct MockRemote {
    data: Mutex<HashMap<String, String>>,
    down: AtomicBool,
    random_failures: Mutex<Option<(f64, StdRng)>>,
    stall: Mutex<Option<Duration>>,
    pub connect_attempts: AtomicUsize,
    pub commands: AtomicUsize,
    pub successes: AtomicUsize,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Refuse connections and fail every command.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Fail each call with probability `rate`, deterministically per seed.
    pub fn fail_randomly(&self, rate: f64, seed: u64) {
        *self.random_failures.lock().unwrap() = Some((rate, StdRng::seed_from_u64(seed)));
    }

    /// Delay every command by `by` before answering.
    pub fn stall(&self, by: Duration) {
        *self.stall.lock().unwrap() = Some(by);
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.data.lock().unwrap().get(key).cloned()
    }

    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    /// Commands the remote answered without an injected failure.
    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    fn injected_failure(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(CacheError::connection("connection refused"));
        }
        if let Some((rate, rng)) = self.random_failures.lock().unwrap().as_mut() {
            if rng.gen_bool(*rate) {
                return Err(CacheError::connection("connection reset by peer"));
            }
        }
        Ok(())
    }

    async fn command(&self) -> Result<()> {
        self.commands.fetch_add(1, Ordering::SeqCst);
        let stall = *self.stall.lock().unwrap();
        if let Some(by) = stall {
            tokio::time::sleep(by).await;
        }
        self.injected_failure()?;
        self.successes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockConnector(pub Arc<MockRemote>);

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>> {
        self.0.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.0.down.load(Ordering::SeqCst) {
            return Err(CacheError::connection("connection refused"));
        }
        Ok(Box::new(MockConnection(self.0.clone())))
    }

    fn describe(&self) -> String {
        "mock://remote".into()
    }
}

struct MockConnection(Arc<MockRemote>);

#[async_trait]
impl StoreConnection for MockConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.0.command().await?;
        Ok(self.0.stored(key))
    }

    async fn set(&mut self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<()> {
        self.0.command().await?;
        self.0.data.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&mut self, keys: &[&str]) -> Result<u64> {
        self.0.command().await?;
        let mut data = self.0.data.lock().unwrap();
        Ok(keys.iter().filter(|k| data.remove(**k).is_some()).count() as u64)
    }

    async fn exists(&mut self, keys: &[&str]) -> Result<u64> {
        self.0.command().await?;
        let data = self.0.data.lock().unwrap();
        Ok(keys.iter().filter(|k| data.contains_key(**k)).count() as u64)
    }

    async fn expire(&mut self, key: &str, _ttl: Duration) -> Result<bool> {
        self.0.command().await?;
        Ok(self.0.data.lock().unwrap().contains_key(key))
    }

    async fn ping(&mut self) -> Result<()> {
        self.0.command().await
    }
}

/// Fallback store that rejects every call.
pub struct FailingFallback;

impl FallbackStore for FailingFallback {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(CacheError::fallback("fallback unavailable"))
    }
    fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<()> {
        Err(CacheError::fallback("fallback unavailable"))
    }
    fn delete(&self, _key: &str) -> Result<u64> {
        Err(CacheError::fallback("fallback unavailable"))
    }
    fn exists(&self, _key: &str) -> Result<bool> {
        Err(CacheError::fallback("fallback unavailable"))
    }
    fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool> {
        Err(CacheError::fallback("fallback unavailable"))
    }
    fn len(&self) -> usize {
        0
    }
}

/// Small, fast-failing configuration for tests.
pub fn test_config() -> CacheConfig {
    let mut config = CacheConfig::default();
    config.pool.max_connections = 4;
    config.pool.connect_timeout_secs = 1;
    config.pool.socket_timeout_secs = 1;
    config.pool.borrow_timeout_ms = 500;
    config.circuit_breaker.failure_threshold = 3;
    config.circuit_breaker.recovery_timeout_secs = 10;
    config.circuit_breaker.max_recovery_timeout_secs = 40;
    config.fallback.max_size = 100;
    config.fallback.ttl_secs = 300;
    config
}

pub fn build_client(config: &CacheConfig, remote: &Arc<MockRemote>, clock: &Arc<ManualClock>) -> ResilientClient {
    ResilientClient::builder(config.clone())
        .connector(Arc::new(MockConnector(remote.clone())))
        .clock(clock.clone())
        .build()
        .unwrap()
}

pub fn build_client_with_fallback(
    config: &CacheConfig,
    remote: &Arc<MockRemote>,
    clock: &Arc<ManualClock>,
    fallback: Arc<dyn FallbackStore>,
) -> ResilientClient {
    ResilientClient::builder(config.clone())
        .connector(Arc::new(MockConnector(remote.clone())))
        .clock(clock.clone())
        .fallback(fallback)
        .build()
        .unwrap()
}
