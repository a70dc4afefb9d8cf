//! A bounded per-queue resource pool: one cached connection/channel per
//! queue name, replaced transparently when found unhealthy at checkout.
//!
//! Grounded on the teacher's `InMemoryMessageBroker`, which guards its
//! routing table behind a lock rather than handing callers a mutable
//! reference directly. Channels are not safe for concurrent AMQP use, so
//! each queue name gets its own slot instead of a single shared handle.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{TransportError, TransportResult};

/// A value the pool can hold: cheap to clone (an `Arc`-backed handle) and
/// able to report whether it is still usable.
pub trait PooledResource: Clone + Send + Sync {
    /// Returns false once the underlying connection/channel has closed.
    fn is_healthy(&self) -> bool;
}

/// A bounded pool of `R`, one slot per queue name.
///
/// `max_queues` bounds the number of distinct queue names the pool will
/// track at once; a checkout for a new name beyond the bound fails rather
/// than growing unbounded; it does not bound per-queue resource reuse.
pub struct ResourcePool<R: PooledResource> {
    slots: DashMap<String, Arc<Mutex<Option<R>>>>,
    max_queues: usize,
}

impl<R: PooledResource> ResourcePool<R> {
    /// Creates an empty pool that tracks at most `max_queues` distinct
    /// queue names.
    pub fn new(max_queues: usize) -> Self {
        Self {
            slots: DashMap::new(),
            max_queues,
        }
    }

    /// Returns a healthy resource for `queue_name`, creating one with
    /// `create` if none is cached or the cached one has gone unhealthy.
    pub async fn checkout<F, Fut>(
        &self,
        queue_name: &str,
        create: F,
    ) -> TransportResult<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TransportResult<R>>,
    {
        if !self.slots.contains_key(queue_name) && self.slots.len() >= self.max_queues {
            return Err(TransportError::pool_exhausted(queue_name, 0));
        }

        let slot = self
            .slots
            .entry(queue_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let cached = slot.lock().clone();
        if let Some(resource) = cached {
            if resource.is_healthy() {
                return Ok(resource);
            }
        }

        let fresh = create().await?;
        *slot.lock() = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drops the cached resource for `queue_name`, forcing the next
    /// checkout to recreate it.
    pub fn evict(&self, queue_name: &str) {
        if let Some(slot) = self.slots.get(queue_name) {
            *slot.lock() = None;
        }
    }

    /// Number of distinct queue names currently tracked.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no queue names are tracked.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
