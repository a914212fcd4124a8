//! Remote store seam.
//!
//! # Data Flow
//! ```text
//! ResilientClient
//!     → Command (GET / SET / DEL / EXISTS / EXPIRE / PING)
//!     → pool::ConnectionPool (borrow a StoreConnection)
//!     → StoreConnection::dispatch (redis.rs on the wire)
//!     → Reply
//! ```
//!
//! # Design Decisions
//! - Operations are data (`Command`) so the same request can be replayed against
//!   the fallback store without duplicating per-operation plumbing
//! - Wire format stays in the driver; this layer only knows the semantic operations

pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{CacheError, Result};

pub use self::redis::{RedisConnection, RedisConnector};

/// One session with the remote store.
#[async_trait]
pub trait StoreConnection: Send {
    async fn get(&mut self, key: &str) -> Result<Option<String>>;

    async fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Returns the number of keys removed.
    async fn del(&mut self, keys: &[&str]) -> Result<u64>;

    /// Returns how many of `keys` exist.
    async fn exists(&mut self, keys: &[&str]) -> Result<u64>;

    /// Returns false when the key does not exist.
    async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool>;

    async fn ping(&mut self) -> Result<()>;

    async fn close(&mut self) {}

    /// Run a [`Command`] on this connection.
    async fn dispatch(&mut self, command: &Command<'_>) -> Result<Reply> {
        match *command {
            Command::Get { key } => self.get(key).await.map(Reply::Value),
            Command::Set { key, ref value, ttl } => {
                self.set(key, value, ttl).await.map(|_| Reply::Done)
            }
            Command::Delete { key } => self.del(&[key]).await.map(Reply::Count),
            Command::Exists { key } => self.exists(&[key]).await.map(|n| Reply::Flag(n > 0)),
            Command::Expire { key, ttl } => self.expire(key, ttl).await.map(Reply::Flag),
            Command::Ping => self.ping().await.map(|_| Reply::Done),
        }
    }
}

/// Opens new sessions with the remote store.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>>;

    /// Human-readable target for logs (credentials redacted).
    fn describe(&self) -> String;
}

/// A semantic cache operation.
#[derive(Debug, Clone)]
pub enum Command<'a> {
    Get { key: &'a str },
    Set { key: &'a str, value: String, ttl: Option<Duration> },
    Delete { key: &'a str },
    Exists { key: &'a str },
    Expire { key: &'a str, ttl: Duration },
    Ping,
}

impl Command<'_> {
    /// Operation name used for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "get",
            Command::Set { .. } => "set",
            Command::Delete { .. } => "delete",
            Command::Exists { .. } => "exists",
            Command::Expire { .. } => "expire",
            Command::Ping => "ping",
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Command::Get { key }
            | Command::Set { key, .. }
            | Command::Delete { key }
            | Command::Exists { key }
            | Command::Expire { key, .. } => Some(*key),
            Command::Ping => None,
        }
    }
}

/// Result of a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Value(Option<String>),
    Count(u64),
    Flag(bool),
    Done,
}

impl Reply {
    pub fn into_value(self) -> Result<Option<String>> {
        match self {
            Reply::Value(v) => Ok(v),
            other => Err(unexpected("value", other)),
        }
    }

    pub fn into_count(self) -> Result<u64> {
        match self {
            Reply::Count(n) => Ok(n),
            other => Err(unexpected("count", other)),
        }
    }

    pub fn into_flag(self) -> Result<bool> {
        match self {
            Reply::Flag(b) => Ok(b),
            other => Err(unexpected("flag", other)),
        }
    }

    pub fn into_done(self) -> Result<()> {
        match self {
            Reply::Done => Ok(()),
            other => Err(unexpected("ok", other)),
        }
    }
}

fn unexpected(expected: &str, got: Reply) -> CacheError {
    CacheError::protocol(format!("expected {} reply, got {:?}", expected, got))
}
