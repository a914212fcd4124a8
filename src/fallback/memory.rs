//! Bounded in-memory fallback store.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::FallbackConfig;
use crate::error::Result;
use crate::fallback::FallbackStore;
use crate::resilience::clock::{Clock, SystemClock};

#[derive(Debug)]
struct Entry {
    value: String,
    inserted_at: Instant,
    ttl: Duration,
    /// Insertion sequence number, key into `Inner::order`.
    seq: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Insertion order: seq → key. The first entry is the oldest.
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Inner {
    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    /// Live entry for `key`, purging it first if it has expired.
    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.remove(key);
            return None;
        }
        self.entries.get_mut(key)
    }
}

/// In-memory fallback bounded by `max_size`.
///
/// Overflow evicts the single oldest-inserted entry; re-setting a key counts as a
/// fresh insertion. Expired entries read as absent and are purged lazily.
#[derive(Debug)]
pub struct MemoryFallback {
    inner: Mutex<Inner>,
    max_size: usize,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl MemoryFallback {
    pub fn new(config: &FallbackConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &FallbackConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_size: config.max_size.max(1),
            default_ttl: config.ttl(),
            clock,
        }
    }

    /// Drop every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }
}

impl FallbackStore for MemoryFallback {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        Ok(inner.live(key, now).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        inner.remove(key);
        while inner.entries.len() >= self.max_size {
            match inner.evict_oldest() {
                Some(evicted) => tracing::debug!(key = %evicted, "Fallback store full, evicted oldest entry"),
                None => break,
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.to_string());
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                inserted_at: now,
                ttl: ttl.unwrap_or(self.default_ttl),
                seq,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<u64> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let removed = inner.remove(key);
        Ok(match removed {
            Some(entry) if !entry.is_expired(now) => 1,
            _ => 0,
        })
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        Ok(inner.live(key, now).is_some())
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.live(key, now) {
            Some(entry) => {
                // lifetime restarts now; insertion order is unchanged
                entry.ttl = now.saturating_duration_since(entry.inserted_at) + ttl;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    fn store(max_size: usize, ttl_secs: u64) -> (MemoryFallback, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = FallbackConfig { max_size, ttl_secs };
        (MemoryFallback::with_clock(&config, clock.clone()), clock)
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let (fb, _) = store(2, 300);
        fb.set("a", "1", None).unwrap();
        fb.set("b", "2", None).unwrap();
        fb.set("c", "3", None).unwrap();

        assert!(!fb.exists("a").unwrap());
        assert!(fb.exists("b").unwrap());
        assert!(fb.exists("c").unwrap());
        assert_eq!(fb.len(), 2);
    }

    #[test]
    fn test_reads_do_not_refresh_order() {
        let (fb, _) = store(2, 300);
        fb.set("a", "1", None).unwrap();
        fb.set("b", "2", None).unwrap();
        assert_eq!(fb.get("a").unwrap().as_deref(), Some("1"));
        fb.set("c", "3", None).unwrap();
        assert!(fb.get("a").unwrap().is_none());
    }

    #[test]
    fn test_reset_counts_as_new_insertion() {
        let (fb, _) = store(2, 300);
        fb.set("a", "1", None).unwrap();
        fb.set("b", "2", None).unwrap();
        fb.set("a", "1b", None).unwrap();
        assert_eq!(fb.len(), 2);
        fb.set("c", "3", None).unwrap();
        assert!(!fb.exists("b").unwrap());
        assert_eq!(fb.get("a").unwrap().as_deref(), Some("1b"));
    }

    #[test]
    fn test_ttl_expiry_is_lazy() {
        let (fb, clock) = store(10, 300);
        fb.set("k", "v", None).unwrap();
        clock.advance(Duration::from_secs(299));
        assert_eq!(fb.get("k").unwrap().as_deref(), Some("v"));

        clock.advance(Duration::from_secs(1));
        assert_eq!(fb.len(), 1);
        assert!(fb.get("k").unwrap().is_none());
        assert_eq!(fb.len(), 0);
    }

    #[test]
    fn test_explicit_ttl_and_purge() {
        let (fb, clock) = store(10, 300);
        fb.set("short", "v", Some(Duration::from_secs(5))).unwrap();
        fb.set("long", "v", None).unwrap();
        clock.advance(Duration::from_secs(5));
        assert_eq!(fb.purge_expired(), 1);
        assert!(fb.exists("long").unwrap());
    }

    #[test]
    fn test_expire_restarts_lifetime() {
        let (fb, clock) = store(10, 10);
        fb.set("k", "v", None).unwrap();
        clock.advance(Duration::from_secs(8));
        assert!(fb.expire("k", Duration::from_secs(10)).unwrap());
        clock.advance(Duration::from_secs(9));
        assert!(fb.exists("k").unwrap());
        clock.advance(Duration::from_secs(1));
        assert!(!fb.exists("k").unwrap());
        assert!(!fb.expire("missing", Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_delete_counts() {
        let (fb, clock) = store(10, 1);
        fb.set("k", "v", None).unwrap();
        assert_eq!(fb.delete("k").unwrap(), 1);
        assert_eq!(fb.delete("k").unwrap(), 0);

        fb.set("old", "v", None).unwrap();
        clock.advance(Duration::from_secs(1));
        assert_eq!(fb.delete("old").unwrap(), 0);
    }
}
