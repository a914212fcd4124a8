//! Fallback store subsystem.
//!
//! Serves cache operations locally while the remote store is unavailable.
//!
//! # Design Decisions
//! - Pluggable: the client only depends on the `FallbackStore` trait
//! - The bundled `MemoryFallback` is bounded and TTL-aware; eviction follows
//!   insertion order, not access order

mod memory;

pub use memory::MemoryFallback;

use std::time::Duration;

use crate::error::Result;

/// Local substitute for the remote store.
pub trait FallbackStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace `key`. `None` uses the store's default TTL.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Returns the number of entries removed (0 or 1).
    fn delete(&self, key: &str) -> Result<u64>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Reset the remaining lifetime of `key`. Returns false if absent.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Entries currently held, including ones not yet purged.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
