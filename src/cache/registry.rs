//! Cache registry - central management for named caches.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{CacheConfig, TypedCache};

/// Registry of typed caches, looked up by name.
///
/// Components create their caches here at construction, which keeps
/// every cache an explicit owned object with a discoverable name.
#[derive(Clone, Default)]
pub struct CacheRegistry {
    caches: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

/// Type-erased registered cache.
struct CacheEntry {
    cache: Box<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl CacheRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cache registered under `name`, or create it.
    ///
    /// # Panics
    /// Panics if a cache with the same name exists with different
    /// key/value types — that is a wiring bug, not a runtime state.
    pub fn get_or_create<K, V>(&self, name: &str, config: CacheConfig) -> TypedCache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let expected = TypeId::of::<TypedCache<K, V>>();

        {
            let caches = self.caches.read();
            if let Some(entry) = caches.get(name) {
                if entry.type_id != expected {
                    panic!(
                        "Cache '{}' already exists with different types: expected {}, got {}",
                        name,
                        std::any::type_name::<TypedCache<K, V>>(),
                        entry.type_name
                    );
                }
                return entry
                    .cache
                    .downcast_ref::<TypedCache<K, V>>()
                    .expect("type id checked above")
                    .clone();
            }
        }

        let cache = TypedCache::new(name, config);
        debug!("Creating cache: {}", name);

        let mut caches = self.caches.write();
        caches.insert(
            name.to_string(),
            CacheEntry {
                cache: Box::new(cache.clone()),
                type_id: expected,
                type_name: std::any::type_name::<TypedCache<K, V>>(),
            },
        );

        cache
    }

    /// Whether a cache with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.caches.read().contains_key(name)
    }

    /// Names of all registered caches.
    pub fn cache_names(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let caches = self.caches.read();
        f.debug_struct("CacheRegistry")
            .field("cache_count", &caches.len())
            .field("cache_names", &caches.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_returns_same_cache() {
        let registry = CacheRegistry::new();

        let first: TypedCache<String, String> =
            registry.get_or_create("context", CacheConfig::default());
        first.insert("key".into(), "value".into());

        let second: TypedCache<String, String> =
            registry.get_or_create("context", CacheConfig::default());
        assert_eq!(second.get(&"key".to_string()), Some("value".to_string()));
        assert!(registry.contains("context"));
    }
}
