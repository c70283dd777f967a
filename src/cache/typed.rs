//! Typed cache wrapper around Moka.

use std::hash::Hash;
use std::sync::Arc;

use moka::sync::Cache;

use super::CacheConfig;

/// A typed cache with a clean API over Moka.
///
/// Thread-safe; cloning is cheap and shares the underlying cache.
/// Expiry is handled internally by Moka, so no foreground call ever
/// blocks on an eviction sweep.
pub struct TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Cache<K, V>>,
    name: Arc<str>,
}

// Manual Clone so K and V don't need to be Clone themselves.
impl<K, V> Clone for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            name: Arc::clone(&self.name),
        }
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache with the given name and config.
    pub fn new(name: impl Into<Arc<str>>, config: CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);

        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }
        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        Self {
            inner: Arc::new(builder.build()),
            name: name.into(),
        }
    }

    /// Name of this cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a key-value pair.
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Get a value if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    /// Remove one key.
    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }

    /// Remove all entries.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of cached entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl<K, V> std::fmt::Debug for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCache")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_insert_get_invalidate() {
        let cache: TypedCache<String, String> =
            TypedCache::new("test", CacheConfig::with_capacity(10));

        cache.insert("swordsman".into(), "melee tank".into());
        assert_eq!(cache.get(&"swordsman".to_string()), Some("melee tank".to_string()));

        cache.invalidate(&"swordsman".to_string());
        assert_eq!(cache.get(&"swordsman".to_string()), None);
    }

    #[test]
    fn test_ttl_expires_entries() {
        let cache: TypedCache<String, String> = TypedCache::new(
            "test_ttl",
            CacheConfig::context_cache(Duration::from_millis(50)),
        );

        cache.insert("key".into(), "value".into());
        assert!(cache.get(&"key".to_string()).is_some());

        std::thread::sleep(Duration::from_millis(80));
        assert!(cache.get(&"key".to_string()).is_none());
    }
}
