//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Client, pool and breaker produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (in-process counters + MetricsSink)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Health endpoint (counter snapshot)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{ClientMetrics, MetricsError, MetricsSink, MetricsSnapshot, NoopSink, PrometheusSink};
