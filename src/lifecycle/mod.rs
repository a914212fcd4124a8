//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build client (connector, pool, breaker, fallback)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → health server stops accepting → pool drained → exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - One composition root; everything else receives its collaborators

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{build_client, StartupError};
