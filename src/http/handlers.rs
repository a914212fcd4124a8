use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::MetricsSnapshot;
use crate::pool::PoolStats;
use crate::resilience::BreakerStatus;

#[derive(Serialize)]
pub struct ClientStatus {
    pub version: &'static str,
    pub identity: String,
    pub breaker: BreakerStatus,
    pub pool: PoolStats,
    pub metrics: MetricsSnapshot,
}

#[derive(Serialize)]
pub struct ResetOutcome {
    pub identity: String,
    pub state: String,
}

pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.reporter.check().await;
    let code = if report.status.is_available() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

pub async fn get_status(State(state): State<AppState>) -> Json<ClientStatus> {
    let client = state.reporter.client();
    Json(ClientStatus {
        version: env!("CARGO_PKG_VERSION"),
        identity: client.identity().to_string(),
        breaker: client.breaker_status(),
        pool: client.pool_stats(),
        metrics: client.metrics(),
    })
}

pub async fn reset_breaker(State(state): State<AppState>) -> Json<ResetOutcome> {
    let client = state.reporter.client();
    client.reset_breaker();
    tracing::info!(identity = %client.identity(), "Circuit breaker reset via HTTP");
    Json(ResetOutcome {
        identity: client.identity().to_string(),
        state: client.breaker_status().state.to_string(),
    })
}
