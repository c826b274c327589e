//! TTL cache implementation.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier_tasks::{BackgroundTasks, TaskResult};
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for a [`TtlCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL used by [`TtlCache::set`].
    pub default_ttl: Duration,
    /// How often the background sweeper runs.
    pub sweep_interval: Duration,
    /// Maximum number of entries. Zero means unbounded.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(600),    // 10 minutes
            sweep_interval: Duration::from_secs(300), // 5 minutes
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    /// Sets the default TTL.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the capacity. Zero means unbounded.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Live through `expires_at` inclusive.
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups that found a live entry.
    pub hits: u64,
    /// Number of lookups that found nothing or an expired entry.
    pub misses: u64,
    /// Entries removed by sweeps or capacity eviction.
    pub evictions: u64,
    /// Entries currently stored, expired ones included.
    pub size: usize,
}

/// Thread-safe key/value store with per-entry expiration.
///
/// Readers never mutate: an expired entry is invisible to [`get`] but stays
/// in the map until a writer ([`sweep`], [`set`], capacity eviction) removes
/// it.
///
/// [`get`]: TtlCache::get
/// [`sweep`]: TtlCache::sweep
/// [`set`]: TtlCache::set
///
/// # Example
///
/// ```
/// use courier_cache::{CacheConfig, TtlCache};
/// use std::time::Duration;
///
/// let cache: TtlCache<String, u32> = TtlCache::new(CacheConfig::default());
/// cache.set_with_ttl("answer".to_string(), 42, Duration::from_secs(60));
/// assert_eq!(cache.get(&"answer".to_string()), Some(42));
/// assert_eq!(cache.size(), 1);
/// ```
#[derive(Debug)]
pub struct TtlCache<K, V> {
    config: CacheConfig,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache without a background sweeper.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Creates a cache and registers its sweeper on `tasks`.
    ///
    /// The sweeper holds a weak reference: once the last `Arc` is dropped its
    /// runs become no-ops, and it exits when `tasks` is closed.
    pub fn with_sweeper(config: CacheConfig, tasks: &BackgroundTasks) -> TaskResult<Arc<Self>> {
        let interval = config.sweep_interval;
        let cache = Arc::new(Self::new(config));
        let weak = Arc::downgrade(&cache);

        tasks.spawn_periodic("ttl-cache-sweep", interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(cache) = weak.upgrade() {
                    let removed = cache.sweep();
                    if removed > 0 {
                        debug!(removed, remaining = cache.size(), "swept expired cache entries");
                    }
                }
            }
        })?;

        Ok(cache)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Stores `value` under `key` with the default TTL.
    pub fn set(&self, key: K, value: V) -> bool {
        self.set_with_ttl(key, value, self.config.default_ttl)
    }

    /// Stores `value` under `key`, expiring after `ttl`.
    ///
    /// Returns false and stores nothing when `ttl` is zero.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) -> bool {
        self.set_at(key, value, ttl, Instant::now())
    }

    fn set_at(&self, key: K, value: V, ttl: Duration, now: Instant) -> bool {
        if ttl.is_zero() {
            return false;
        }

        let entry = CacheEntry {
            value,
            inserted_at: now,
            expires_at: now + ttl,
        };

        let mut entries = self.entries.write();

        if self.config.max_entries > 0
            && entries.len() >= self.config.max_entries
            && !entries.contains_key(&key)
        {
            self.evict_expired(&mut entries, now);

            while entries.len() >= self.config.max_entries {
                let Some(oldest) = Self::find_oldest(&entries) else {
                    break;
                };
                entries.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        entries.insert(key, entry);
        true
    }

    /// Returns the value for `key` if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Removes `key`. Returns true if it was present.
    pub fn delete(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns the number of stored entries, including expired ones not yet swept.
    pub fn size(&self) -> usize {
        self.entries.read().len()
    }

    /// Removes all expired entries and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write();
        self.evict_expired(&mut entries, Instant::now())
    }

    /// Returns hit, miss and eviction counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.size(),
        }
    }

    fn evict_expired(&self, entries: &mut HashMap<K, CacheEntry<V>>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - entries.len();
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        evicted
    }

    fn find_oldest(entries: &HashMap<K, CacheEntry<V>>) -> Option<K> {
        entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cache() -> TtlCache<String, String> {
        TtlCache::new(CacheConfig::default())
    }

    #[test]
    fn test_set_and_get() {
        let cache = cache();
        assert!(cache.set("k".to_string(), "v".to_string()));
        assert_eq!(cache.get(&"k".to_string()), Some("v".to_string()));
        assert_eq!(cache.get(&"missing".to_string()), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_zero_ttl_not_stored() {
        let cache = cache();
        assert!(!cache.set_with_ttl("k".to_string(), "v".to_string(), Duration::ZERO));
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_boundary() {
        let cache = cache();
        cache.set_with_ttl("k".to_string(), "v".to_string(), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.get(&"k".to_string()), Some("v".to_string()));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"k".to_string()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_does_not_remove_expired() {
        let cache = cache();
        cache.set_with_ttl("k".to_string(), "v".to_string(), Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.get(&"k".to_string()), None);
        assert_eq!(cache.size(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_all_expired() {
        let cache = cache();
        for i in 0..50 {
            cache.set_with_ttl(format!("k{i}"), "v".to_string(), Duration::from_secs(10 + i));
        }
        tokio::time::advance(Duration::from_secs(120)).await;

        assert_eq!(cache.sweep(), 50);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.stats().evictions, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_entries() {
        let cache = cache();
        cache.set_with_ttl("short".to_string(), "v".to_string(), Duration::from_secs(5));
        cache.set_with_ttl("long".to_string(), "v".to_string(), Duration::from_secs(500));
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.get(&"long".to_string()), Some("v".to_string()));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = cache();
        cache.set("a".to_string(), "1".to_string());
        cache.set("b".to_string(), "2".to_string());

        assert!(cache.delete(&"a".to_string()));
        assert!(!cache.delete(&"a".to_string()));
        assert_eq!(cache.size(), 1);

        cache.clear();
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let cache: TtlCache<u32, u32> =
            TtlCache::new(CacheConfig::default().with_max_entries(2));
        cache.set(1, 1);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set(2, 2);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set(3, 3);

        assert_eq!(cache.size(), 2);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&3), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let cache: TtlCache<u32, u32> =
            TtlCache::new(CacheConfig::default().with_max_entries(1));
        cache.set(1, 1);
        cache.set(1, 2);
        assert_eq!(cache.get(&1), Some(2));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper() {
        let tasks = BackgroundTasks::new();
        let cache: Arc<TtlCache<u32, u32>> = TtlCache::with_sweeper(
            CacheConfig::default().with_sweep_interval(Duration::from_secs(300)),
            &tasks,
        )
        .unwrap();

        cache.set_with_ttl(1, 1, Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(cache.size(), 0);

        tasks.close().await;
        assert_eq!(tasks.running_count(), 0);
    }

    proptest! {
        #[test]
        fn prop_visible_until_ttl(ttl_ms in 1u64..100_000, offset_ms in 0u64..200_000) {
            let cache: TtlCache<u8, u8> = TtlCache::new(CacheConfig::default());
            let start = Instant::now();
            let ttl = Duration::from_millis(ttl_ms);
            cache.set_at(1, 9, ttl, start);

            let found = cache.get_at(&1, start + Duration::from_millis(offset_ms));
            if offset_ms <= ttl_ms {
                prop_assert_eq!(found, Some(9));
            } else {
                prop_assert_eq!(found, None);
            }
        }

        #[test]
        fn prop_keys_isolated(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            let cache: TtlCache<(i64, String), u8> = TtlCache::new(CacheConfig::default());
            cache.set((a, "/weather Paris".to_string()), 1);
            prop_assert_eq!(cache.get(&(b, "/weather Paris".to_string())), None);
        }
    }
}
