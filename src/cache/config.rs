//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Time-to-live; entries are evicted this long after insertion.
    pub ttl: Option<Duration>,

    /// Time-to-idle; entries are evicted when unread for this long.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)),
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Create a config with the given max capacity.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    /// Set max capacity.
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Set time-to-live.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// Set time-to-idle.
    #[must_use]
    pub fn tti(mut self, duration: Duration) -> Self {
        self.tti = Some(duration);
        self
    }

    /// Config for assembled context strings: the source data changes
    /// rarely, so capacity stays small and TTL carries the eviction.
    pub fn context_cache(ttl: Duration) -> Self {
        Self {
            max_capacity: 2_000,
            ttl: Some(ttl),
            tti: None,
        }
    }
}
