use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Thread-safe LRU cache for generation replies
///
/// Identical composed requests produce identical replies, so re-sending
/// them only adds latency and billing. Keys are request digests, values
/// the raw reply text. LRU eviction keeps memory bounded.
pub struct ReplyCache {
    cache: Mutex<LruCache<String, String>>,
}

impl ReplyCache {
    /// Create a new reply cache with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("Cache capacity must be at least 1");

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Get a cached reply for a request digest
    pub fn get(&self, key: &str) -> Option<String> {
        self.cache.lock().unwrap().get(key).cloned()
    }

    /// Store a reply in the cache
    pub fn put(&self, key: String, reply: String) {
        self.cache.lock().unwrap().put(key, reply);
    }

    /// Get the current number of cached entries
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        self.cache.lock().unwrap().clear()
    }
}
