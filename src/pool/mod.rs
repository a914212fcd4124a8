//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! ResilientClient operation
//!     → ConnectionPool::borrow(timeout)
//!         - wait for a slot (semaphore, bounded by max_connections)
//!         - reuse an idle session (LIFO) or connect a new one
//!     → remote command on the PooledConnection
//!     → ConnectionPool::release(conn, healthy)
//!         - healthy + keep_alive: back to the idle set
//!         - otherwise: closed in the background, live count decremented
//! ```
//!
//! # Design Decisions
//! - The pool knows nothing about circuit state; it only surfaces typed errors
//! - Slots are held by the handle, so a dropped handle can never leak capacity
//! - Idle sessions past `idle_timeout` are discarded on borrow
//! - `release` stays synchronous, so discarded sessions are closed on a spawned task

mod connection;

pub use connection::PooledConnection;

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::config::PoolConfig;
use crate::error::{CacheError, Result};
use crate::observability::ClientMetrics;
use crate::resilience::timeouts::with_timeout;
use crate::store::{Connector, StoreConnection};
use connection::LiveSlot;

struct IdleConnection {
    conn: Box<dyn StoreConnection>,
    idle_since: Instant,
}

/// State shared between the pool and its outstanding handles.
pub(crate) struct PoolShared {
    idle: Mutex<Vec<IdleConnection>>,
    pub(crate) live: AtomicUsize,
    created: AtomicU64,
    pub(crate) discarded: AtomicU64,
    borrow_timeouts: AtomicU64,
}

impl std::fmt::Debug for PoolShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolShared")
            .field("live", &self.live.load(Ordering::Relaxed))
            .finish()
    }
}

/// Pool statistics for health reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub max_connections: usize,
    /// Idle plus borrowed sessions.
    pub live: usize,
    pub idle: usize,
    pub in_use: usize,
    pub created_total: u64,
    pub discarded_total: u64,
    pub borrow_timeouts: u64,
    pub closed: bool,
}

/// Bounded pool of remote store sessions.
pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    slots: Arc<Semaphore>,
    shared: Arc<PoolShared>,
    config: PoolConfig,
    metrics: Arc<ClientMetrics>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn Connector>, config: PoolConfig, metrics: Arc<ClientMetrics>) -> Self {
        tracing::info!(
            target_store = %connector.describe(),
            max_connections = config.max_connections,
            keep_alive = config.keep_alive,
            "Connection pool created"
        );
        Self {
            connector,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            shared: Arc::new(PoolShared {
                idle: Mutex::new(Vec::new()),
                live: AtomicUsize::new(0),
                created: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
                borrow_timeouts: AtomicU64::new(0),
            }),
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Borrow a session, waiting at most `timeout` for a free slot.
    pub async fn borrow(&self, timeout: Duration) -> Result<PooledConnection> {
        let permit = match tokio::time::timeout(timeout, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(CacheError::PoolClosed),
            Err(_) => {
                self.shared.borrow_timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    max_connections = self.config.max_connections,
                    "Connection pool exhausted"
                );
                return Err(CacheError::Timeout {
                    operation: "pool borrow",
                    after: timeout,
                });
            }
        };

        if let Some(conn) = self.take_idle() {
            return Ok(PooledConnection {
                conn,
                slot: LiveSlot::new(self.shared.clone()),
                permit,
                reused: true,
            });
        }

        let conn = with_timeout("connect", self.config.connect_timeout(), self.connector.connect()).await?;
        self.shared.live.fetch_add(1, Ordering::Relaxed);
        self.shared.created.fetch_add(1, Ordering::Relaxed);
        self.metrics.connection_created();
        tracing::debug!(
            live = self.shared.live.load(Ordering::Relaxed),
            "Opened new remote connection"
        );

        Ok(PooledConnection {
            conn,
            slot: LiveSlot::new(self.shared.clone()),
            permit,
            reused: false,
        })
    }

    /// Return a borrowed session. Unhealthy sessions are discarded.
    pub fn release(&self, conn: PooledConnection, healthy: bool) {
        let PooledConnection {
            conn, slot, permit, ..
        } = conn;

        if healthy && self.config.keep_alive && !self.slots.is_closed() {
            self.shared.idle.lock().push(IdleConnection {
                conn,
                idle_since: Instant::now(),
            });
            slot.keep();
        } else {
            close_detached(conn);
            drop(slot);
        }
        drop(permit);
    }

    fn take_idle(&self) -> Option<Box<dyn StoreConnection>> {
        let idle_timeout = self.config.idle_timeout();
        let mut idle = self.shared.idle.lock();
        while let Some(candidate) = idle.pop() {
            if candidate.idle_since.elapsed() < idle_timeout {
                return Some(candidate.conn);
            }
            // stale: closed here, outside the borrowed count
            self.shared.live.fetch_sub(1, Ordering::Relaxed);
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            close_detached(candidate.conn);
        }
        None
    }

    /// Lightweight remote ping, independent of any breaker state.
    pub async fn health_check(&self) -> bool {
        let mut conn = match self.borrow(self.config.borrow_timeout()).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(error = %e, "Health check could not borrow a connection");
                return false;
            }
        };
        let result = with_timeout("ping", self.config.socket_timeout(), conn.ping()).await;
        let healthy = result.is_ok();
        if let Err(e) = result {
            tracing::debug!(error = %e, "Health check ping failed");
        }
        self.release(conn, healthy);
        healthy
    }

    pub fn stats(&self) -> PoolStats {
        let available = self.slots.available_permits();
        PoolStats {
            max_connections: self.config.max_connections,
            live: self.shared.live.load(Ordering::Relaxed),
            idle: self.shared.idle.lock().len(),
            in_use: self.config.max_connections.saturating_sub(available),
            created_total: self.shared.created.load(Ordering::Relaxed),
            discarded_total: self.shared.discarded.load(Ordering::Relaxed),
            borrow_timeouts: self.shared.borrow_timeouts.load(Ordering::Relaxed),
            closed: self.slots.is_closed(),
        }
    }

    /// Stop lending and close every idle session. Borrowed sessions are
    /// discarded when released.
    pub async fn shutdown(&self) {
        self.slots.close();
        let idle = std::mem::take(&mut *self.shared.idle.lock());
        let count = idle.len();
        for mut entry in idle {
            entry.conn.close().await;
            self.shared.live.fetch_sub(1, Ordering::Relaxed);
        }
        tracing::info!(closed = count, "Connection pool shut down");
    }
}

/// Close a discarded session on a background task. Outside a runtime the
/// session is dropped.
fn close_detached(mut conn: Box<dyn StoreConnection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                conn.close().await;
            });
        }
        Err(_) => drop(conn),
    }
}
