//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for the health and admin routes
//! - Wire up middleware (request ID, timeout, tracing)
//! - Serve until the shutdown coordinator fires

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::HealthConfig;
use crate::health::HealthReporter;
use crate::http::handlers;

const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub reporter: Arc<HealthReporter>,
}

pub struct HealthServer {
    router: Router,
}

impl HealthServer {
    pub fn new(reporter: Arc<HealthReporter>, config: &HealthConfig) -> Self {
        let router = Self::build_router(AppState { reporter }, config);
        Self { router }
    }

    /// Router with all middleware layers, exposed for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    #[allow(deprecated)]
    fn build_router(state: AppState, config: &HealthConfig) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        Router::new()
            .route("/health", get(handlers::get_health))
            .route("/status", get(handlers::get_status))
            .route("/breaker/reset", post(handlers::reset_breaker))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
                    .layer(PropagateRequestIdLayer::new(request_id)),
            )
    }

    /// Serve on `listener` until a shutdown broadcast arrives.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Health server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Health server received shutdown signal");
            })
            .await?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}
