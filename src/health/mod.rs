//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → HealthReporter::check()
//!         → ping (pool, bypasses the breaker)
//!         → write / read / delete probe through ResilientClient
//!         → fold results into healthy | degraded | unhealthy
//! ```
//!
//! # Design Decisions
//! - Probes go through the full client so they exercise the breaker and fallback
//!   exactly like real traffic
//! - A probe served by the fallback is a success for availability but marks the
//!   report degraded

pub mod reporter;

pub use reporter::{CheckResult, HealthChecks, HealthReport, HealthReporter, HealthStatus};
