//! Error taxonomy for the cache client.
//!
//! # Propagation
//! - `Connection`, `Timeout` and `RemoteProtocol` come from the remote path and are
//!   absorbed by the client (recorded into the breaker, then served from fallback)
//! - `CircuitOpen` and `FallbackExhausted` are the only errors a caller ever sees from
//!   a cache operation; both carry the fallback failure that made them fatal

use std::time::Duration;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Remote store unreachable (refused, reset, DNS, dropped).
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Pool borrow or remote call exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Remote store answered, but with an error or an unexpected reply.
    #[error("remote protocol error: {message}")]
    RemoteProtocol { message: String },

    /// Circuit denied the call and the fallback store failed as well.
    #[error("circuit open for {identity}; fallback failed: {fallback}")]
    CircuitOpen {
        identity: String,
        fallback: Box<CacheError>,
    },

    /// Remote call failed and the fallback attempt failed too.
    #[error("remote failed ({primary}) and fallback failed ({fallback})")]
    FallbackExhausted {
        primary: Box<CacheError>,
        fallback: Box<CacheError>,
    },

    /// Raised by a fallback store implementation.
    #[error("fallback store error: {message}")]
    Fallback { message: String },

    #[error("value encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The pool has been shut down.
    #[error("connection pool is closed")]
    PoolClosed,
}

impl CacheError {
    pub fn connection(message: impl Into<String>) -> Self {
        CacheError::Connection {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        CacheError::RemoteProtocol {
            message: message.into(),
        }
    }

    pub fn fallback(message: impl Into<String>) -> Self {
        CacheError::Fallback {
            message: message.into(),
        }
    }

    /// True when both the primary path and the fallback failed for one call.
    pub fn is_double_failure(&self) -> bool {
        matches!(
            self,
            CacheError::CircuitOpen { .. } | CacheError::FallbackExhausted { .. }
        )
    }

    /// The error that sent the call to the fallback, if this is a double failure.
    pub fn primary_cause(&self) -> Option<&CacheError> {
        match self {
            CacheError::FallbackExhausted { primary, .. } => Some(primary),
            _ => None,
        }
    }

    /// The error raised by the fallback store, if this is a double failure.
    pub fn fallback_cause(&self) -> Option<&CacheError> {
        match self {
            CacheError::CircuitOpen { fallback, .. }
            | CacheError::FallbackExhausted { fallback, .. } => Some(fallback),
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::Connection { .. } => "connection",
            CacheError::Timeout { .. } => "timeout",
            CacheError::RemoteProtocol { .. } => "protocol",
            CacheError::CircuitOpen { .. } => "circuit_open",
            CacheError::FallbackExhausted { .. } => "fallback_exhausted",
            CacheError::Fallback { .. } => "fallback",
            CacheError::Serialization(_) => "serialization",
            CacheError::PoolClosed => "pool_closed",
        }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CacheError::Timeout {
                operation: "remote call",
                after: Duration::ZERO,
            }
        } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            CacheError::connection(err.to_string())
        } else {
            CacheError::protocol(err.to_string())
        }
    }
}
