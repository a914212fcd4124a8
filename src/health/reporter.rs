//! Composite health report.
//!
//! # Responsibilities
//! - Run a ping plus a write/read/delete round trip on a unique probe key
//! - Attach breaker, pool and metrics snapshots
//! - Classify the result for ops tooling

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::client::{ResilientClient, Served, Source};
use crate::error::Result;
use crate::observability::MetricsSnapshot;
use crate::pool::PoolStats;
use crate::resilience::BreakerStatus;
use crate::store::{Command, Reply};

const PROBE_VALUE: &str = "ok";
const PROBE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Degraded still serves traffic.
    pub fn is_available(self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    pub source: Option<Source>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn passed(source: Source, started: Instant) -> Self {
        Self {
            ok: true,
            source: Some(source),
            latency_ms: started.elapsed().as_millis() as u64,
            error: None,
        }
    }

    fn failed(source: Option<Source>, started: Instant, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            source,
            latency_ms: started.elapsed().as_millis() as u64,
            error: Some(error.into()),
        }
    }

    fn via_remote(&self) -> bool {
        self.ok && self.source == Some(Source::Remote)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub ping: CheckResult,
    pub write: CheckResult,
    pub read: CheckResult,
    pub delete: CheckResult,
}

impl HealthChecks {
    fn status(&self) -> HealthStatus {
        let probes = [&self.write, &self.read, &self.delete];
        if probes.iter().any(|c| !c.ok) {
            HealthStatus::Unhealthy
        } else if self.ping.ok && probes.iter().all(|c| c.via_remote()) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Unix seconds.
    pub timestamp: u64,
    pub breaker: BreakerStatus,
    pub pool: PoolStats,
    pub metrics: MetricsSnapshot,
    pub checks: HealthChecks,
}

pub struct HealthReporter {
    client: Arc<ResilientClient>,
    probe_prefix: String,
}

impl HealthReporter {
    pub fn new(client: Arc<ResilientClient>, probe_prefix: impl Into<String>) -> Self {
        Self {
            client,
            probe_prefix: probe_prefix.into(),
        }
    }

    pub fn client(&self) -> &Arc<ResilientClient> {
        &self.client
    }

    pub async fn check(&self) -> HealthReport {
        let key = format!("{}{}", self.probe_prefix, uuid::Uuid::new_v4());

        let started = Instant::now();
        let ping = if self.client.ping().await {
            CheckResult::passed(Source::Remote, started)
        } else {
            CheckResult::failed(Some(Source::Remote), started, "ping failed")
        };

        let write = probe(self.client.execute(Command::Set {
            key: &key,
            value: PROBE_VALUE.to_string(),
            ttl: Some(PROBE_TTL),
        }))
        .await;

        let started = Instant::now();
        let read = match self.client.execute(Command::Get { key: &key }).await {
            Ok(Served { value, source }) => match value.into_value() {
                Ok(Some(v)) if v == PROBE_VALUE => CheckResult::passed(source, started),
                Ok(other) => CheckResult::failed(Some(source), started, format!("probe value mismatch: {other:?}")),
                Err(e) => CheckResult::failed(Some(source), started, e.to_string()),
            },
            Err(e) => CheckResult::failed(None, started, e.to_string()),
        };

        let delete = probe(self.client.execute(Command::Delete { key: &key })).await;

        let checks = HealthChecks {
            ping,
            write,
            read,
            delete,
        };
        let status = checks.status();
        if status != HealthStatus::Healthy {
            tracing::warn!(status = ?status, "Health check not fully healthy");
        }

        HealthReport {
            status,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            breaker: self.client.breaker_status(),
            pool: self.client.pool_stats(),
            metrics: self.client.metrics(),
            checks,
        }
    }
}

async fn probe(call: impl Future<Output = Result<Served<Reply>>>) -> CheckResult {
    let started = Instant::now();
    match call.await {
        Ok(served) => CheckResult::passed(served.source, started),
        Err(e) => CheckResult::failed(None, started, e.to_string()),
    }
}
