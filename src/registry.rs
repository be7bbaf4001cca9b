//! Shared handle cache keyed by pool address
//!
//! Concurrent requests for the same pool must share one handle, and the
//! expensive construction (account fetches, layout decoding) must run at
//! most once per key. The map entry is an `Arc<OnceCell>`: the map lock
//! is only held to clone the cell, so slow construction of one pool
//! never blocks lookups of another.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::OnceCell;
use tracing::debug;

/// Concurrency-safe cache of per-pool handles.
pub struct PoolRegistry<T> {
    pools: DashMap<Pubkey, Arc<OnceCell<Arc<T>>>>,
}

impl<T> Default for PoolRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PoolRegistry<T> {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Get the handle for `address`, constructing it with `init` if absent.
    ///
    /// Callers racing on the same address all wait on one construction
    /// and receive clones of the same `Arc`. A failed construction leaves
    /// the cell empty, so the next caller retries instead of caching the
    /// error.
    pub async fn get_or_init<F, Fut>(&self, address: &Pubkey, init: F) -> anyhow::Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        // Clone the cell and release the map guard before awaiting.
        let cell = Arc::clone(
            &self
                .pools
                .entry(*address)
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );

        let handle = cell
            .get_or_try_init(|| async {
                debug!(pool = %address, "Constructing pool handle");
                init().await.map(Arc::new)
            })
            .await?;

        Ok(handle.clone())
    }

    /// Handle for `address` if one has been fully constructed.
    pub fn get(&self, address: &Pubkey) -> Option<Arc<T>> {
        self.pools
            .get(address)
            .and_then(|cell| cell.get().cloned())
    }

    /// Drop the entry for `address`; a later request rebuilds it.
    pub fn remove(&self, address: &Pubkey) {
        self.pools.remove(address);
    }

    /// Number of known addresses, including ones mid-construction.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
