//! Borrowed connection handle.
//!
//! # Responsibilities
//! - Own one remote session exclusively while an operation is in flight
//! - Hold the pool slot (semaphore permit) for the duration of the borrow
//! - Keep the live-connection count honest when a handle is dropped without release

use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;

use crate::pool::PoolShared;
use crate::store::StoreConnection;

/// Counts one live connection; decrements on drop unless handed back to the idle set.
#[derive(Debug)]
pub(crate) struct LiveSlot {
    shared: Arc<PoolShared>,
    armed: bool,
}

impl LiveSlot {
    pub(crate) fn new(shared: Arc<PoolShared>) -> Self {
        Self {
            shared,
            armed: true,
        }
    }

    /// The connection goes back to the idle set and stays live.
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for LiveSlot {
    fn drop(&mut self) {
        if self.armed {
            self.shared.live.fetch_sub(1, Ordering::Relaxed);
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// A connection borrowed from [`ConnectionPool`](crate::pool::ConnectionPool).
///
/// Hand it back with `ConnectionPool::release`. Dropping it instead discards the
/// session and frees the slot.
pub struct PooledConnection {
    pub(crate) conn: Box<dyn StoreConnection>,
    pub(crate) slot: LiveSlot,
    pub(crate) permit: OwnedSemaphorePermit,
    pub(crate) reused: bool,
}

impl PooledConnection {
    /// True if this session came from the idle set rather than a fresh connect.
    pub fn is_reused(&self) -> bool {
        self.reused
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("reused", &self.reused)
            .finish()
    }
}

impl Deref for PooledConnection {
    type Target = dyn StoreConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut()
    }
}
