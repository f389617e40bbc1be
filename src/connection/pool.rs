//! Async connection pool.
//!
//! A semaphore bounds how many connections are checked out; a deque holds
//! idle connections for reuse. The idle queue and the live count sit behind
//! one `parking_lot::Mutex` (sync, held very briefly) so connections can be
//! returned in `Drop` without needing async. No lock is held across I/O.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, trace, warn};

use crate::config::{ConnectionConfig, PoolMode};
use crate::connection::conn::Connection;
use crate::error::{RedisError, Result};

struct Idle {
    conns: VecDeque<Connection>,
    /// Live connections: idle + checked out + being created.
    created: usize,
    /// Bumped by `disconnect_all`; older connections are not reused.
    generation: u64,
}

struct PoolInner {
    idle: SyncMutex<Idle>,
    semaphore: Arc<Semaphore>,
    config: ConnectionConfig,
    max_size: usize,
}

/// A bounded pool of connections to one server. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("addr", &self.inner.config.addr())
            .field("max_size", &self.inner.max_size)
            .field("idle", &self.idle_count())
            .field("created", &self.created_count())
            .finish()
    }
}

impl ConnectionPool {
    /// Create a pool. No connection is opened until first use (see [`warm`]).
    ///
    /// [`warm`]: ConnectionPool::warm
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let max_size = config.pool_size;
        Ok(Self {
            inner: Arc::new(PoolInner {
                idle: SyncMutex::new(Idle {
                    conns: VecDeque::with_capacity(max_size),
                    created: 0,
                    generation: 0,
                }),
                semaphore: Arc::new(Semaphore::new(max_size)),
                config,
                max_size,
            }),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Check out a connection.
    ///
    /// Returns a [`PooledConnection`] which, when dropped, returns the
    /// connection to the pool (or discards it if it is no longer usable).
    pub async fn acquire(&self) -> Result<PooledConnection> {
        loop {
            let permit = self.acquire_permit().await?;
            let candidate = {
                let mut idle = self.inner.idle.lock();
                self.take_idle(&mut idle)
            };
            let Some((conn, generation)) = candidate else {
                let (conn, generation) = self.create_connection().await?;
                return Ok(self.guard(conn, generation, permit));
            };

            let mut guard = self.guard(conn, generation, permit);
            let needs_check = self
                .inner
                .config
                .health_check_interval
                .is_some_and(|interval| guard.idle_for() >= interval);
            if needs_check {
                if let Err(e) = guard.ping().await {
                    warn!(conn = guard.id(), error = %e, "idle connection failed health check");
                    guard.discard();
                    continue;
                }
            }
            trace!(conn = guard.id(), "reusing idle connection");
            return Ok(guard);
        }
    }

    fn guard(
        &self,
        conn: Connection,
        generation: u64,
        permit: OwnedSemaphorePermit,
    ) -> PooledConnection {
        PooledConnection {
            conn: Some(conn),
            generation,
            pool: self.clone(),
            _permit: permit,
        }
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        let semaphore = Arc::clone(&self.inner.semaphore);
        match self.inner.config.pool_mode {
            PoolMode::NonBlocking => semaphore.try_acquire_owned().map_err(|e| match e {
                TryAcquireError::NoPermits => RedisError::PoolExhausted(format!(
                    "all {} connections are in use",
                    self.inner.max_size
                )),
                TryAcquireError::Closed => pool_closed(),
            }),
            PoolMode::Blocking { timeout } => {
                match tokio::time::timeout(timeout, semaphore.acquire_owned()).await {
                    Ok(Ok(permit)) => Ok(permit),
                    Ok(Err(_)) => Err(pool_closed()),
                    Err(_) => Err(RedisError::PoolExhausted(format!(
                        "no connection became available within {timeout:?}"
                    ))),
                }
            }
        }
    }

    /// Open connections until `min_idle` are idle (bounded by `pool_size`).
    ///
    /// Each connection holds a checkout slot while it is being opened, so a
    /// concurrent `acquire` cannot push the pool past its bound.
    pub async fn warm(&self) -> Result<()> {
        let target = self.inner.config.min_idle;
        while self.idle_count() < target {
            let Ok(_permit) = Arc::clone(&self.inner.semaphore).try_acquire_owned() else {
                break;
            };
            let Some(reservation) = self.try_reserve() else {
                break;
            };
            let conn = Connection::connect(&self.inner.config).await?;
            let generation = reservation.commit();
            debug!(conn = conn.id(), "pool warmed connection");
            self.return_connection(conn, generation);
        }
        Ok(())
    }

    /// Close every idle connection and retire the checked-out ones: they are
    /// closed when released instead of going back to the idle set.
    pub fn disconnect_all(&self) {
        let drained: Vec<Connection> = {
            let mut idle = self.inner.idle.lock();
            idle.generation += 1;
            let drained: Vec<_> = idle.conns.drain(..).collect();
            idle.created -= drained.len();
            drained
        };
        debug!(closed = drained.len(), "disconnect_all");
        // Dropping the transports closes the sockets.
        drop(drained);
    }

    /// Number of idle connections.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().conns.len()
    }

    /// Number of live connections (idle + checked out).
    pub fn created_count(&self) -> usize {
        self.inner.idle.lock().created
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    /// Free checkout slots (max_size - checked_out).
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    async fn create_connection(&self) -> Result<(Connection, u64)> {
        let reservation = self.reserve();
        let conn = Connection::connect(&self.inner.config).await?;
        let generation = reservation.commit();
        debug!(conn = conn.id(), addr = conn.addr(), "pool opened connection");
        Ok((conn, generation))
    }

    /// Count a connection that is about to be created. If the pool is full,
    /// the least recently used idle connection makes room.
    fn reserve(&self) -> Reservation<'_> {
        let evicted = {
            let mut idle = self.inner.idle.lock();
            let evicted = if idle.created >= self.inner.max_size {
                let oldest = idle.conns.pop_front();
                if oldest.is_some() {
                    idle.created -= 1;
                }
                oldest
            } else {
                None
            };
            idle.created += 1;
            evicted
        };
        if let Some(conn) = evicted {
            trace!(conn = conn.id(), "evicted idle connection to make room");
        }
        Reservation {
            pool: self,
            committed: false,
        }
    }

    /// Like [`reserve`](Self::reserve) but never evicts: `None` when full.
    fn try_reserve(&self) -> Option<Reservation<'_>> {
        let mut idle = self.inner.idle.lock();
        if idle.created >= self.inner.max_size {
            return None;
        }
        idle.created += 1;
        Some(Reservation {
            pool: self,
            committed: false,
        })
    }

    /// Take the most recently used idle connection (LIFO for cache warmth),
    /// dropping stale ones.
    fn take_idle(&self, idle: &mut Idle) -> Option<(Connection, u64)> {
        while let Some(conn) = idle.conns.pop_back() {
            let stale = self
                .inner
                .config
                .idle_timeout
                .is_some_and(|timeout| conn.idle_for() > timeout);
            if stale || !conn.is_usable() {
                idle.created -= 1;
                debug!(conn = conn.id(), stale, "dropping idle connection");
                continue;
            }
            return Some((conn, idle.generation));
        }
        None
    }

    /// Return a connection to the pool (sync, safe for Drop).
    fn return_connection(&self, conn: Connection, generation: u64) {
        let mut idle = self.inner.idle.lock();
        if !conn.is_usable() || generation != idle.generation {
            idle.created -= 1;
            drop(idle);
            debug!(
                conn = conn.id(),
                state = ?conn.state(),
                pending = conn.pending_replies(),
                "discarding connection"
            );
            return;
        }
        idle.conns.push_back(conn);
    }

    fn forget(&self, n: usize) {
        self.inner.idle.lock().created -= n;
    }
}

/// Created-count slot held while a connection is being opened. Released on
/// drop unless committed, so a failed or cancelled connect leaks nothing.
struct Reservation<'a> {
    pool: &'a ConnectionPool,
    committed: bool,
}

impl Reservation<'_> {
    fn commit(mut self) -> u64 {
        self.committed = true;
        self.pool.inner.idle.lock().generation
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.pool.forget(1);
        }
    }
}

fn pool_closed() -> RedisError {
    RedisError::connection(std::io::ErrorKind::Other, "pool semaphore closed")
}

/// RAII guard for a checked-out connection.
///
/// Dropping it releases the connection: back to the idle set if it is still
/// usable and not retired, otherwise closed.
pub struct PooledConnection {
    conn: Option<Connection>,
    generation: u64,
    pool: ConnectionPool,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl PooledConnection {
    /// Close the connection instead of returning it to the pool.
    pub fn discard(mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.mark_broken();
        }
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already released")
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already released")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.return_connection(conn, self.generation);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
