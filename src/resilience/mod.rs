//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call for an identity:
//!     → circuit_breaker.rs (admit: allow / trial / deny)
//!     → timeouts.rs (every borrow and remote call has a deadline)
//!     → On timeout: backoff.rs (jittered delay before the optional re-attempt)
//!     → circuit_breaker.rs (record success / failure, recovery backoff)
//!
//! Agent-style callers:
//!     → executor.rs (same breaker, on-deny action, retry scheduling port)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - One breaker implementation, generic over the protected identity
//! - Time is injected (clock.rs) so recovery logic is testable without sleeping

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod executor;
pub mod timeouts;

pub use circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitState, Decision, Transition};
pub use clock::{Clock, ManualClock, SystemClock};
pub use executor::{GuardError, GuardedExecutor, RetryReason, RetryRequest, RetryScheduler};
