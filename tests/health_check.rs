//! Health reporter and HTTP endpoint tests.

use std::sync::Arc;
use std::time::Duration;

use resilient_cache::config::HealthConfig;
use resilient_cache::health::{HealthReporter, HealthStatus};
use resilient_cache::http::HealthServer;
use resilient_cache::lifecycle::Shutdown;
use resilient_cache::resilience::{CircuitState, ManualClock};
use resilient_cache::Source;

mod common;

use common::{build_client, build_client_with_fallback, test_config, FailingFallback, MockRemote};

const PREFIX: &str = "__health_check__";

#[tokio::test]
async fn test_reachable_store_is_healthy() {
    let remote = MockRemote::new();
    let clock = Arc::new(ManualClock::new());
    let reporter = HealthReporter::new(Arc::new(build_client(&test_config(), &remote, &clock)), PREFIX);

    let report = reporter.check().await;

    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.checks.ping.ok);
    for check in [&report.checks.write, &report.checks.read, &report.checks.delete] {
        assert!(check.ok);
        assert_eq!(check.source, Some(Source::Remote));
    }
    assert_eq!(report.breaker.state, CircuitState::Closed);
    assert!(report.timestamp > 0);
    // Probe key is cleaned up.
    assert_eq!(remote.commands(), 4);
}

#[tokio::test]
async fn test_outage_with_working_fallback_is_degraded() {
    let remote = MockRemote::new();
    remote.set_down(true);
    let clock = Arc::new(ManualClock::new());
    let reporter = HealthReporter::new(Arc::new(build_client(&test_config(), &remote, &clock)), PREFIX);

    let report = reporter.check().await;

    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(!report.checks.ping.ok);
    assert_eq!(report.checks.read.source, Some(Source::Fallback));
    assert!(report.metrics.fallback_used >= 3);
}

#[tokio::test]
async fn test_outage_with_failing_fallback_is_unhealthy() {
    let remote = MockRemote::new();
    remote.set_down(true);
    let clock = Arc::new(ManualClock::new());
    let client = build_client_with_fallback(&test_config(), &remote, &clock, Arc::new(FailingFallback));
    let reporter = HealthReporter::new(Arc::new(client), PREFIX);

    let report = reporter.check().await;

    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(!report.checks.write.ok);
    assert!(report.checks.write.error.is_some());
}

#[tokio::test]
async fn test_http_endpoints() {
    let remote = MockRemote::new();
    remote.set_down(true);
    let clock = Arc::new(ManualClock::new());
    let client = Arc::new(build_client_with_fallback(&test_config(), &remote, &clock, Arc::new(FailingFallback)));
    let reporter = Arc::new(HealthReporter::new(client.clone(), PREFIX));

    let shutdown = Shutdown::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HealthServer::new(reporter, &HealthConfig::default());
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let http = reqwest::Client::new();
    let base = format!("http://{addr}");

    let res = http.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert!(res.headers().contains_key("x-request-id"));
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert!(body["checks"]["ping"].is_object());

    // Three failed probes tripped the breaker.
    let status: serde_json::Value = http.get(format!("{base}/status")).send().await.unwrap().json().await.unwrap();
    assert_eq!(status["breaker"]["state"], "OPEN");
    assert_eq!(status["identity"], "remote_store");

    let reset: serde_json::Value = http
        .post(format!("{base}/breaker/reset"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset["state"], "CLOSED");
    assert_eq!(client.breaker_status().state, CircuitState::Closed);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
