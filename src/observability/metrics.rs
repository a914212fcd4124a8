//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count client outcomes in-process (served on the health endpoint)
//! - Forward every outcome to a pluggable `MetricsSink`
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `connections_created` (counter): new remote sessions opened by the pool
//! - `commands_executed` (counter): remote commands that succeeded, by operation
//! - `commands_failed` (counter): remote commands that failed, by operation and error
//! - `circuit_breaker_trips` (counter): transitions into Open, by identity
//! - `fallback_used` (counter): operations served by the fallback store, by reason
//!
//! # Design Decisions
//! - Telemetry is best effort: sink errors and panics are swallowed and logged
//! - Low-overhead metric updates (atomic operations)

use serde::Serialize;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const CONNECTIONS_CREATED: &str = "connections_created";
pub const COMMANDS_EXECUTED: &str = "commands_executed";
pub const COMMANDS_FAILED: &str = "commands_failed";
pub const CIRCUIT_BREAKER_TRIPS: &str = "circuit_breaker_trips";
pub const FALLBACK_USED: &str = "fallback_used";

#[derive(Debug, thiserror::Error)]
#[error("metrics sink error: {0}")]
pub struct MetricsError(pub String);

/// Destination for metric reports.
pub trait MetricsSink: Send + Sync {
    fn report(&self, name: &str, value: f64, labels: &[(&str, &str)]) -> Result<(), MetricsError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn report(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Sink backed by the `metrics` facade (scraped through the Prometheus exporter).
#[derive(Debug, Clone)]
pub struct PrometheusSink {
    prefix: String,
}

impl PrometheusSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new("cache_client")
    }
}

impl MetricsSink for PrometheusSink {
    fn report(&self, name: &str, value: f64, labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        if !value.is_finite() || value < 0.0 {
            return Err(MetricsError(format!("invalid counter increment {} for {}", value, name)));
        }
        let labels: Vec<metrics::Label> = labels
            .iter()
            .map(|(k, v)| metrics::Label::new(k.to_string(), v.to_string()))
            .collect();
        metrics::counter!(format!("{}_{}", self.prefix, name), labels).increment(value as u64);
        Ok(())
    }
}

/// Point-in-time copy of the client counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub connections_created: u64,
    pub commands_executed: u64,
    pub commands_failed: u64,
    pub circuit_breaker_trips: u64,
    pub fallback_used: u64,
}

/// In-process counters plus sink forwarding.
pub struct ClientMetrics {
    connections_created: AtomicU64,
    commands_executed: AtomicU64,
    commands_failed: AtomicU64,
    circuit_breaker_trips: AtomicU64,
    fallback_used: AtomicU64,
    sink: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new(Arc::new(NoopSink))
    }
}

impl ClientMetrics {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            connections_created: AtomicU64::new(0),
            commands_executed: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            circuit_breaker_trips: AtomicU64::new(0),
            fallback_used: AtomicU64::new(0),
            sink,
        }
    }

    pub fn connection_created(&self) {
        self.connections_created.fetch_add(1, Ordering::Relaxed);
        self.emit(CONNECTIONS_CREATED, &[]);
    }

    pub fn command_executed(&self, operation: &str) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
        self.emit(COMMANDS_EXECUTED, &[("operation", operation)]);
    }

    pub fn command_failed(&self, operation: &str, error_kind: &str) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
        self.emit(COMMANDS_FAILED, &[("operation", operation), ("error", error_kind)]);
    }

    pub fn circuit_tripped(&self, identity: &str) {
        self.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
        self.emit(CIRCUIT_BREAKER_TRIPS, &[("identity", identity)]);
    }

    pub fn fallback_used(&self, operation: &str, reason: &str) {
        self.fallback_used.fetch_add(1, Ordering::Relaxed);
        self.emit(FALLBACK_USED, &[("operation", operation), ("reason", reason)]);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_created: self.connections_created.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            circuit_breaker_trips: self.circuit_breaker_trips.load(Ordering::Relaxed),
            fallback_used: self.fallback_used.load(Ordering::Relaxed),
        }
    }

    fn emit(&self, name: &str, labels: &[(&str, &str)]) {
        match catch_unwind(AssertUnwindSafe(|| self.sink.report(name, 1.0, labels))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(metric = name, error = %e, "Metrics sink rejected report"),
            Err(_) => tracing::warn!(metric = name, "Metrics sink panicked; report dropped"),
        }
    }
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, Vec<(String, String)>)>>);

    impl MetricsSink for Recording {
        fn report(&self, name: &str, _value: f64, labels: &[(&str, &str)]) -> Result<(), MetricsError> {
            self.0.lock().push((
                name.to_string(),
                labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ));
            Ok(())
        }
    }

    struct Failing;

    impl MetricsSink for Failing {
        fn report(&self, _: &str, _: f64, _: &[(&str, &str)]) -> Result<(), MetricsError> {
            Err(MetricsError("collector down".into()))
        }
    }

    struct Panicking;

    impl MetricsSink for Panicking {
        fn report(&self, _: &str, _: f64, _: &[(&str, &str)]) -> Result<(), MetricsError> {
            panic!("sink bug")
        }
    }

    #[test]
    fn test_counters_and_labels() {
        let sink = Arc::new(Recording::default());
        let metrics = ClientMetrics::new(sink.clone());
        metrics.command_executed("get");
        metrics.command_failed("set", "timeout");
        metrics.fallback_used("set", "remote_error");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.commands_executed, 1);
        assert_eq!(snapshot.commands_failed, 1);
        assert_eq!(snapshot.fallback_used, 1);

        let reports = sink.0.lock();
        assert_eq!(reports[1].0, COMMANDS_FAILED);
        assert_eq!(reports[1].1[1], ("error".to_string(), "timeout".to_string()));
    }

    #[test]
    fn test_sink_failures_never_propagate() {
        let failing = ClientMetrics::new(Arc::new(Failing));
        failing.circuit_tripped("remote_store");
        assert_eq!(failing.snapshot().circuit_breaker_trips, 1);

        let panicking = ClientMetrics::new(Arc::new(Panicking));
        panicking.connection_created();
        panicking.connection_created();
        assert_eq!(panicking.snapshot().connections_created, 2);
    }

    #[test]
    fn test_prometheus_sink_rejects_negative_values() {
        let sink = PrometheusSink::default();
        assert!(sink.report("fallback_used", -1.0, &[]).is_err());
        assert!(sink.report("fallback_used", 1.0, &[("operation", "get")]).is_ok());
    }
}
