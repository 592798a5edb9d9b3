//! TTL cache for successful tool results.
//!
//! Entries expire lazily: a read at or past `stored_at + ttl` removes the entry
//! and reports a miss. There is no background sweep, so keys that are never
//! read again stay resident until the cache is dropped or cleared.
//!
//! All operations are synchronous and never held across an `.await`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// A cached value and the moment it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub stored_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }
}

/// Generic key→value store with a fixed time-to-live.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a clone of the live value for `key`, evicting it if expired.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl, now) => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(key);
                debug!(key = %key, "Cache entry expired");
                None
            }
            None => None,
        }
    }

    /// Store `value`, overwriting any previous entry and resetting its age.
    pub fn set(&self, key: impl Into<String>, value: T) {
        let entry = CacheEntry {
            data: value,
            stored_at: Instant::now(),
        };
        self.lock().insert(key.into(), entry);
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove `key`; returns whether an entry (live or expired) was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of resident entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        // A panic while holding the lock cannot leave a half-written map entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_overwrite() {
        let cache = TtlCache::new(Duration::from_secs(60));
        assert!(cache.get("k").is_none());

        cache.set("k", 1);
        assert_eq!(cache.get("k"), Some(1));

        cache.set("k", 2);
        assert_eq!(cache.get("k"), Some(2));
        assert!(cache.has("k"));
    }

    #[test]
    fn test_expired_entry_is_removed_on_read() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.set("k", "v".to_string());
        std::thread::sleep(Duration::from_millis(30));

        // Still resident until somebody reads it.
        assert_eq!(cache.len(), 1);
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_zero_ttl_never_serves() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.set("k", 1);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.get("b"), Some(2));

        cache.clear();
        assert!(cache.is_empty());
    }
}
