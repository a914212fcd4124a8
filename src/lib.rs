//! Resilient cache client library.
//!
//! A Redis client wrapper that keeps answering when the remote store does not:
//! a per-identity circuit breaker sheds calls to a failing store, a bounded
//! connection pool caps concurrency, and an in-memory fallback serves reads and
//! writes while the store is unavailable.

// Core
pub mod client;
pub mod error;
pub mod fallback;
pub mod pool;
pub mod store;

// Cross-cutting concerns
pub mod config;
pub mod observability;
pub mod resilience;

// Ops surface
pub mod health;
pub mod http;
pub mod lifecycle;

pub use client::{CacheValue, ClientBuilder, ResilientClient, Served, Source};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use fallback::{FallbackStore, MemoryFallback};
pub use health::{HealthReport, HealthReporter, HealthStatus};
pub use resilience::{CircuitBreaker, CircuitState};
