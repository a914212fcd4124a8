//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → env overrides (REMOTE_STORE_URL, MAX_CONNECTIONS, ...)
//!     → validation.rs (semantic checks)
//!     → CacheConfig (validated, immutable)
//!     → handed to lifecycle::startup, the single composition root
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    CacheConfig, CircuitBreakerConfig, FallbackConfig, HealthConfig, ObservabilityConfig,
    PoolConfig, RemoteConfig, RetryConfig,
};
