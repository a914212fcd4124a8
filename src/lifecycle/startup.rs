//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build the client from its collaborators in dependency order
//!
//! # Design Decisions
//! - The only place concrete implementations are chosen (Redis connector,
//!   in-memory fallback, Prometheus sink); everything downstream sees traits

use std::sync::Arc;

use crate::client::ResilientClient;
use crate::config::validation::{validate_config, ValidationError};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::observability::{MetricsSink, NoopSink, PrometheusSink};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", join(.0))]
    Invalid(Vec<ValidationError>),
    #[error(transparent)]
    Client(#[from] CacheError),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Build a Redis-backed client with an in-memory fallback.
pub fn build_client(config: &CacheConfig) -> Result<Arc<ResilientClient>, StartupError> {
    validate_config(config).map_err(StartupError::Invalid)?;

    let sink: Arc<dyn MetricsSink> = if config.observability.metrics_enabled {
        Arc::new(PrometheusSink::default())
    } else {
        Arc::new(NoopSink)
    };

    let client = ResilientClient::builder(config.clone())
        .metrics_sink(sink)
        .build()?;

    tracing::info!(
        identity = %client.identity(),
        max_connections = config.pool.max_connections,
        failure_threshold = config.circuit_breaker.failure_threshold,
        fallback_max_size = config.fallback.max_size,
        "Cache client ready"
    );
    Ok(Arc::new(client))
}
