use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    created: Instant,
    expires: Instant,
}

/// In-process expiring key-value cache. Entries are advisory and never the
/// system of record: the persisted record is authoritative on any miss.
///
/// Keys are composite (requester role + id + subject) so one tenant's entry
/// can never be served to another.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the value while its TTL has not elapsed.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .get(key)
            .filter(|e| Instant::now() < e.expires)
            .map(|e| e.value.clone())
    }

    /// Returns the value, fresh or not, as long as it was created within
    /// `max_age`. This is the degraded-read path used when the
    /// authoritative store is failing.
    pub fn get_if_fresher_than(&self, key: &K, max_age: Duration) -> Option<V> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .get(key)
            .filter(|e| e.created.elapsed() < max_age)
            .map(|e| e.value.clone())
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        // Opportunistic cleanup keeps the map from accumulating dead slots.
        entries.retain(|_, e| e.created.elapsed() < Duration::from_secs(120));
        entries.insert(
            key,
            Entry {
                value,
                created: now,
                expires: now + ttl,
            },
        );
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry_is_served() {
        let cache = TtlCache::new();
        cache.insert("k", 1u32, Duration::from_secs(2));
        assert_eq!(cache.get(&"k"), Some(1));
    }

    #[test]
    fn test_expired_entry_is_not_served() {
        let cache = TtlCache::new();
        cache.insert("k", 1u32, Duration::from_millis(0));
        assert_eq!(cache.get(&"k"), None);
    }

    #[test]
    fn test_stale_entry_available_within_grace() {
        let cache = TtlCache::new();
        cache.insert("k", 7u32, Duration::from_millis(0));
        // Past its TTL, but created well within the 30 s grace window.
        assert_eq!(cache.get(&"k"), None);
        assert_eq!(
            cache.get_if_fresher_than(&"k", Duration::from_secs(30)),
            Some(7)
        );
        assert_eq!(
            cache.get_if_fresher_than(&"k", Duration::from_millis(0)),
            None
        );
    }

    #[test]
    fn test_keys_do_not_collide() {
        let cache = TtlCache::new();
        cache.insert(("hospital", 1), "a", Duration::from_secs(2));
        cache.insert(("patient", 1), "b", Duration::from_secs(2));
        assert_eq!(cache.get(&("hospital", 1)), Some("a"));
        assert_eq!(cache.get(&("patient", 1)), Some("b"));
    }
}
