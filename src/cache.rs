use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;

/// Default number of resolved addresses kept in memory.
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => unreachable!(),
};

/// Container ID -> resolved address, evicting the least recently used entry.
///
/// Entries are never invalidated explicitly. A container ID reused after the
/// original container is gone would see the old address until evicted.
pub struct AddressCache {
    inner: Mutex<LruCache<String, String>>,
}

impl AddressCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Looks up `id`, marking it as most recently used on a hit.
    pub fn get(&self, id: &str) -> Option<String> {
        self.lock().get(id).cloned()
    }

    pub fn put(&self, id: &str, address: &str) {
        self.lock().put(id.to_string(), address.to_string());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, String>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
