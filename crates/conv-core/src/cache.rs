//! Bounded, recency-ordered cache of per-thread tree projections.
//!
//! A single `tokio::sync::Mutex` guards the whole map. That serializes
//! concurrent accesses to different threads too, but it is what makes a
//! miss's construction atomic: two callers racing on the same cold thread
//! never run the loader twice, because the second caller blocks on the
//! mutex until the first has already inserted the entry.

use std::sync::Arc;

use conv_error::{Error, Result};
use indexmap::IndexMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::ids::ThreadId;
use crate::message::MessageTree;
use crate::summary::SummaryTree;

/// A thread's tree projections, held together so a cache entry always
/// reflects one atomically-loaded snapshot.
#[derive(Debug, Clone)]
pub struct CachedThread {
    pub message_tree: MessageTree,
    pub summary_tree: SummaryTree,
}

pub type CachedThreadHandle = Arc<RwLock<CachedThread>>;

pub struct TreeCache {
    capacity: usize,
    entries: Mutex<IndexMap<ThreadId, CachedThreadHandle>>,
}

impl TreeCache {
    /// `capacity` is the maximum number of threads kept resident; `0` is
    /// rejected since a zero-capacity cache can never retain anything a
    /// concurrent reader might also be waiting on.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvariantViolation(
                "TreeCache capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity)),
        })
    }

    /// Returns the cached projection for `thread_id`, loading it with
    /// `loader` on a miss. Marks the entry most-recently-used either way.
    pub async fn get<F, Fut>(&self, thread_id: ThreadId, loader: F) -> Result<CachedThreadHandle>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<CachedThread>>,
    {
        let mut entries = self.entries.lock().await;

        if let Some(handle) = entries.shift_remove(&thread_id) {
            trace!(%thread_id, "tree cache hit");
            entries.insert(thread_id, handle.clone());
            return Ok(handle);
        }

        debug!(%thread_id, "tree cache miss");
        let loaded = loader().await?;
        let handle: CachedThreadHandle = Arc::new(RwLock::new(loaded));
        entries.insert(thread_id, handle.clone());

        if entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                debug!(%evicted, "tree cache evicted least-recently-used thread");
            }
        }

        Ok(handle)
    }

    /// Drops `thread_id` from the cache, if present. The next `get` for it
    /// reloads from the store.
    pub async fn invalidate(&self, thread_id: ThreadId) {
        let mut entries = self.entries.lock().await;
        entries.shift_remove(&thread_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
