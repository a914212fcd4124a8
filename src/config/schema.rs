//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the cache client.
//! All types derive Serde traits for deserialization from config files, and every
//! field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the resilient cache client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Remote key-value store settings.
    pub remote: RemoteConfig,

    /// Connection pool settings.
    pub pool: PoolConfig,

    /// Circuit breaker thresholds and recovery backoff.
    pub circuit_breaker: CircuitBreakerConfig,

    /// In-memory fallback store settings.
    pub fallback: FallbackConfig,

    /// Retry backoff for `retry_on_timeout`.
    pub retries: RetryConfig,

    /// Health endpoint settings.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Remote store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Connection URL (e.g., "redis://127.0.0.1:6379/0").
    pub url: String,

    /// Breaker identity used for the remote store.
    pub identity: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            identity: "remote_store".to_string(),
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum connections (idle + borrowed).
    pub max_connections: usize,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Per-command timeout in seconds.
    pub socket_timeout_secs: u64,

    /// Maximum wait for a free connection, in milliseconds.
    pub borrow_timeout_ms: u64,

    /// Idle connections older than this are discarded on borrow.
    pub idle_timeout_secs: u64,

    /// Keep healthy connections for reuse. When false, every connection is closed after use.
    pub keep_alive: bool,

    /// Re-attempt a timed-out remote call once on a fresh connection.
    pub retry_on_timeout: bool,
}

impl PoolConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }

    pub fn borrow_timeout(&self) -> Duration {
        Duration::from_millis(self.borrow_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 50,
            connect_timeout_secs: 5,
            socket_timeout_secs: 5,
            borrow_timeout_ms: 5000,
            idle_timeout_secs: 300,
            keep_alive: true,
            retry_on_timeout: false,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker from Closed to Open.
    pub failure_threshold: u32,

    /// Base recovery timeout in seconds.
    pub recovery_timeout_secs: u64,

    /// Upper bound for the recovery timeout in seconds.
    pub max_recovery_timeout_secs: u64,

    /// Growth factor applied to the recovery timeout after a failed half-open trial.
    pub backoff_multiplier: f64,

    /// Trial calls admitted concurrently while half-open.
    pub half_open_max_trials: u32,
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    pub fn max_recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.max_recovery_timeout_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            max_recovery_timeout_secs: 3600,
            backoff_multiplier: 2.0,
            half_open_max_trials: 1,
        }
    }
}

/// Fallback store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Maximum number of entries held in memory.
    pub max_size: usize,

    /// Default entry TTL in seconds.
    pub ttl_secs: u64,
}

impl FallbackConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl_secs: 300,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Serve the health endpoint.
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout for health endpoint handlers in seconds.
    pub request_timeout_secs: u64,

    /// Key prefix used by write/read/delete probes.
    pub probe_key_prefix: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 10,
            probe_key_prefix: "__health_check__".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = CacheConfig::default();
        assert_eq!(config.pool.max_connections, 50);
        assert_eq!(config.pool.socket_timeout(), Duration::from_secs(5));
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout(), Duration::from_secs(60));
        assert_eq!(config.circuit_breaker.max_recovery_timeout(), Duration::from_secs(3600));
        assert_eq!(config.fallback.max_size, 1000);
        assert_eq!(config.fallback.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CacheConfig = toml::from_str(
            r#"
            [circuit_breaker]
            failure_threshold = 3

            [fallback]
            max_size = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.recovery_timeout_secs, 60);
        assert_eq!(config.fallback.max_size, 2);
        assert_eq!(config.fallback.ttl_secs, 300);
        assert_eq!(config.remote.identity, "remote_store");
    }
}
