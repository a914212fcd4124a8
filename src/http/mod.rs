//! HTTP surface for ops tooling.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, timeout, trace layers)
//!     → handlers.rs
//!         GET  /health        → HealthReporter::check (200 / 503)
//!         GET  /status        → breaker + pool + metrics snapshot
//!         POST /breaker/reset → ResilientClient::reset_breaker
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, HealthServer};
