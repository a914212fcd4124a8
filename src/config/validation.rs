//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, timeouts > 0, sizes > 0)
//! - Check the remote store URL scheme
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CacheConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use url::Url;

use crate::config::schema::CacheConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &CacheConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.remote.url) {
        Ok(url) if url.scheme() == "redis" || url.scheme() == "rediss" => {}
        Ok(url) => errors.push(ValidationError::new(
            "remote.url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("remote.url", e.to_string())),
    }
    if config.remote.identity.is_empty() {
        errors.push(ValidationError::new("remote.identity", "must not be empty"));
    }

    let pool = &config.pool;
    if pool.max_connections == 0 {
        errors.push(ValidationError::new("pool.max_connections", "must be > 0"));
    }
    if pool.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("pool.connect_timeout_secs", "must be > 0"));
    }
    if pool.socket_timeout_secs == 0 {
        errors.push(ValidationError::new("pool.socket_timeout_secs", "must be > 0"));
    }
    if pool.borrow_timeout_ms == 0 {
        errors.push(ValidationError::new("pool.borrow_timeout_ms", "must be > 0"));
    }

    let cb = &config.circuit_breaker;
    if cb.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be > 0"));
    }
    if cb.recovery_timeout_secs == 0 {
        errors.push(ValidationError::new("circuit_breaker.recovery_timeout_secs", "must be > 0"));
    }
    if cb.max_recovery_timeout_secs < cb.recovery_timeout_secs {
        errors.push(ValidationError::new(
            "circuit_breaker.max_recovery_timeout_secs",
            "must be >= recovery_timeout_secs",
        ));
    }
    if !cb.backoff_multiplier.is_finite() || cb.backoff_multiplier <= 1.0 {
        errors.push(ValidationError::new(
            "circuit_breaker.backoff_multiplier",
            "must be a finite number > 1.0",
        ));
    }
    if cb.half_open_max_trials == 0 {
        errors.push(ValidationError::new("circuit_breaker.half_open_max_trials", "must be > 0"));
    }

    if config.fallback.max_size == 0 {
        errors.push(ValidationError::new("fallback.max_size", "must be > 0"));
    }
    if config.fallback.ttl_secs == 0 {
        errors.push(ValidationError::new("fallback.ttl_secs", "must be > 0"));
    }

    if config.retries.max_delay_ms < config.retries.base_delay_ms {
        errors.push(ValidationError::new("retries.max_delay_ms", "must be >= base_delay_ms"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CacheConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_non_finite_multiplier() {
        for multiplier in [f64::INFINITY, f64::NAN, 0.5] {
            let mut config = CacheConfig::default();
            config.circuit_breaker.backoff_multiplier = multiplier;
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors[0].field, "circuit_breaker.backoff_multiplier");
        }
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = CacheConfig::default();
        config.remote.url = "http://localhost:6379".into();
        config.circuit_breaker.failure_threshold = 0;
        config.circuit_breaker.max_recovery_timeout_secs = 10;
        config.circuit_breaker.backoff_multiplier = 1.0;
        config.fallback.max_size = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "remote.url",
                "circuit_breaker.failure_threshold",
                "circuit_breaker.max_recovery_timeout_secs",
                "circuit_breaker.backoff_multiplier",
                "fallback.max_size",
            ]
        );
    }
}
