//! # Pool registry: process-wide bookkeeping of live pools.
//!
//! Every [`EventPool`] built with the default builder settings joins
//! [`PoolRegistry::global`]; [`PoolRegistry::shutdown_all`] closes all of them
//! in one call.
//!
//! ## Architecture
//! ```text
//! EventPoolBuilder::build() ──► registry.register(pool)     (Weak handle)
//! EventPool::close()        ──► registry.remove(id)
//! drop(last EventPool)      ──► registry.remove(id)
//!
//! shutdown_all():
//!   take every entry ──► upgrade ──► pool.close().await   (drain)
//! ```
//!
//! ## Rules
//! - The registry never keeps a pool alive (entries are `Weak`).
//! - `shutdown_all` is idempotent: a second call finds nothing to close.
//! - Pools registered while `shutdown_all` runs are closed by the next call.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;

use super::event_pool::{EventPool, Inner};

static GLOBAL: OnceLock<Arc<PoolRegistry>> = OnceLock::new();

/// Registry of live event pools.
#[derive(Default)]
pub struct PoolRegistry {
    pools: DashMap<u64, Weak<Inner>>,
}

impl PoolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Process-wide registry used by default.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(PoolRegistry::new))
    }

    /// Tracks `pool` (idempotent).
    pub fn register(&self, pool: &EventPool) {
        self.pools.insert(pool.inner.id, pool.downgrade());
    }

    /// Stops tracking `pool`.
    pub fn unregister(&self, pool: &EventPool) {
        self.remove(pool.inner.id);
    }

    pub(crate) fn remove(&self, id: u64) {
        self.pools.remove(&id);
    }

    /// Number of tracked pools that are still alive.
    pub fn len(&self) -> usize {
        self.pools.iter().filter(|p| p.value().strong_count() > 0).count()
    }

    /// Returns `true` if no live pool is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes (drains) every tracked pool and returns how many were closed.
    pub async fn shutdown_all(&self) -> usize {
        let ids: Vec<u64> = self.pools.iter().map(|p| *p.key()).collect();

        let mut pools = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, weak)) = self.pools.remove(&id) {
                if let Some(inner) = weak.upgrade() {
                    pools.push(EventPool::from_inner(inner));
                }
            }
        }

        let mut closed = 0;
        for pool in pools {
            match pool.close().await {
                Ok(()) => closed += 1,
                Err(e) => {
                    tracing::debug!(target: "eventpool", pool = pool.name(), error = %e, "pool already closed");
                }
            }
        }
        tracing::debug!(target: "eventpool", closed, "shutdown_all finished");
        closed
    }
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.pools.len())
            .finish()
    }
}

/// Closes every pool of [`PoolRegistry::global`].
pub async fn shutdown_all() -> usize {
    PoolRegistry::global().shutdown_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::DispatchError;

    #[tokio::test]
    async fn test_shutdown_all_is_idempotent() {
        let registry = PoolRegistry::new();
        let a = EventPool::builder(Config::default())
            .with_registry(Arc::clone(&registry))
            .build();
        let b = EventPool::builder(Config::default())
            .with_registry(Arc::clone(&registry))
            .build();
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.shutdown_all().await, 2);
        assert!(a.is_closed());
        assert!(b.is_closed());
        assert!(registry.is_empty());

        assert_eq!(registry.shutdown_all().await, 0);

        for pool in [&a, &b] {
            assert_eq!(pool.emit_sync("x.y", ()).await, vec![DispatchError::EmitterClosed]);

            let mut rx = pool.emit("x.y", ());
            assert_eq!(rx.recv().await, Some(Err(DispatchError::EmitterClosed)));
            assert_eq!(rx.recv().await, None);
        }
    }

    #[tokio::test]
    async fn test_close_and_drop_leave_registry() {
        let registry = PoolRegistry::new();
        let closed = EventPool::builder(Config::default())
            .with_registry(Arc::clone(&registry))
            .build();
        let dropped = EventPool::builder(Config::default())
            .with_registry(Arc::clone(&registry))
            .build();

        closed.close().await.unwrap();
        drop(dropped);

        assert!(registry.is_empty());
        assert_eq!(registry.shutdown_all().await, 0);
    }

    #[tokio::test]
    async fn test_unregistered_pool_survives_shutdown_all() {
        let registry = PoolRegistry::new();
        let pool = EventPool::builder(Config::default())
            .with_registry(Arc::clone(&registry))
            .build();
        registry.unregister(&pool);

        assert_eq!(registry.shutdown_all().await, 0);
        assert!(!pool.is_closed());
    }
}
