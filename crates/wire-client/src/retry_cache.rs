//! Bounded message-retry cache.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Default number of message retry counters kept per linking attempt.
pub const DEFAULT_RETRY_CACHE_CAPACITY: usize = 512;

/// Thread-safe bounded cache of per-message retry counters.
///
/// Owned by exactly one linking attempt; its lifetime is the attempt's
/// lifetime, so counters never leak across accounts. The stack consults and
/// bumps counters when it re-requests undelivered messages.
#[derive(Clone)]
pub struct RetryCache {
    inner: Arc<Mutex<LruCache<String, u32>>>,
}

impl RetryCache {
    /// Create a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RETRY_CACHE_CAPACITY)
    }

    /// Create a cache bounded to `capacity` entries.
    ///
    /// A zero capacity is treated as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Record one retry attempt for a message, returning the new count.
    pub fn record_attempt(&self, message_id: &str) -> u32 {
        let mut cache = self.inner.lock().unwrap();
        let count = cache.get(message_id).copied().unwrap_or(0) + 1;
        cache.put(message_id.to_string(), count);
        count
    }

    /// Current retry count for a message, if tracked.
    pub fn get(&self, message_id: &str) -> Option<u32> {
        let mut cache = self.inner.lock().unwrap();
        cache.get(message_id).copied()
    }

    /// Number of tracked messages.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all counters.
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

impl Default for RetryCache {
    fn default() -> Self {
        Self::new()
    }
}
