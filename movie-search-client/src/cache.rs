use crate::{AggregatedResponse, CanonicalMovie, Provider, Query};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Configuration for the cache system
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// How long to keep whole search responses in cache
    pub query_ttl: Duration,
    /// How long to keep per-movie detail records in cache
    pub detail_ttl: Duration,
    /// Maximum number of cached entries per cache
    pub max_entries: usize,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            query_ttl: Duration::minutes(15),
            detail_ttl: Duration::hours(1),
            max_entries: 1000,
            enabled: true,
        }
    }
}

/// Cached value with metadata
#[derive(Clone, Debug)]
pub struct CachedResult<V> {
    pub data: V,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<V> CachedResult<V> {
    pub fn new(data: V, ttl: Duration) -> Self {
        Self {
            data,
            created_at: Utc::now(),
            ttl,
        }
    }

    /// Check if the cached result is still valid
    pub fn is_valid(&self) -> bool {
        Utc::now() < self.created_at + self.ttl
    }
}

/// Cache key for both cache tiers
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum CacheKey {
    /// Hash of the normalized query
    Query(String),
    /// One movie from one provider
    Detail(Provider, String),
}

impl CacheKey {
    /// Generate a cache key for a search query
    pub fn from_query(query: &Query) -> Self {
        let mut hasher = Sha256::new();
        // Length-prefixed so field boundaries are part of the hash.
        for field in query.normalized_fields() {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        CacheKey::Query(hex::encode(hasher.finalize()))
    }

    pub fn detail(provider: Provider, external_id: &str) -> Self {
        CacheKey::Detail(provider, external_id.to_string())
    }
}

/// Per-key loader gate with the number of callers currently holding it.
#[derive(Default)]
struct Gate {
    lock: Arc<Mutex<()>>,
    holders: usize,
}

struct GateHolder<'a, K: Eq + Hash> {
    in_flight: &'a DashMap<K, Gate>,
    key: &'a K,
}

impl<K: Eq + Hash> Drop for GateHolder<'_, K> {
    fn drop(&mut self) {
        self.in_flight.remove_if_mut(self.key, |_, gate| {
            gate.holders -= 1;
            gate.holders == 0
        });
    }
}

/// In-memory TTL cache with per-key single-flight loading.
///
/// Entries live in a sharded [`DashMap`]. Concurrent misses on the same key
/// queue behind a per-key gate so only one loader runs; the others re-check
/// the cache once it finishes. Failed loads are never stored.
pub struct TtlCache<K, V> {
    name: &'static str,
    cache: DashMap<K, CachedResult<V>>,
    in_flight: DashMap<K, Gate>,
    ttl: Duration,
    max_entries: usize,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Memoizes enriched movies per `(provider, external id)`.
pub type DetailCache = TtlCache<CacheKey, CanonicalMovie>;

/// Memoizes final responses per normalized query.
pub type QueryCache = TtlCache<CacheKey, AggregatedResponse>;

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new(name: &'static str, ttl: Duration, config: &CacheConfig) -> Self {
        Self {
            name,
            cache: DashMap::new(),
            in_flight: DashMap::new(),
            ttl,
            max_entries: config.max_entries.max(1),
            enabled: config.enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get cached value if available and valid
    pub fn get(&self, key: &K) -> Option<V> {
        if !self.enabled {
            return None;
        }

        let found = self.lookup(key);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Return the cached value, or run `fetch` once and store its success.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_fetch_if(key, fetch, |_| true).await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but only stores values
    /// accepted by `should_store`. Rejected values are still returned.
    pub async fn get_or_fetch_if<F, Fut, E, P>(
        &self,
        key: K,
        fetch: F,
        should_store: P,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        P: FnOnce(&V) -> bool,
    {
        if !self.enabled {
            return fetch().await;
        }

        if let Some(hit) = self.lookup(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("{} cache hit for key: {:?}", self.name, key);
            return Ok(hit);
        }

        let gate = {
            let mut entry = self.in_flight.entry(key.clone()).or_default();
            entry.holders += 1;
            entry.lock.clone()
        };
        // Released on drop, so a cancelled caller still leaves the map.
        let _holder = GateHolder {
            in_flight: &self.in_flight,
            key: &key,
        };

        let result = {
            let _guard = gate.lock().await;
            match self.lookup(&key) {
                Some(hit) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    log::debug!("{} cache hit after waiting for key: {:?}", self.name, key);
                    Ok(hit)
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    log::debug!("{} cache miss for key: {:?}", self.name, key);
                    let fetched = fetch().await;
                    match &fetched {
                        Ok(value) => {
                            if should_store(value) {
                                self.put(key.clone(), value.clone());
                            } else {
                                log::debug!("{} cache skipped storing key: {:?}", self.name, key);
                            }
                        }
                        Err(_) => {
                            log::debug!("{} cache fetch failed for key: {:?}", self.name, key)
                        }
                    }
                    fetched
                }
            }
        };
        result
    }

    /// Store value in cache
    pub fn put(&self, key: K, data: V) {
        if !self.enabled {
            return;
        }

        // Check if we need to evict old entries
        if self.cache.len() >= self.max_entries {
            self.evict_expired();

            // If still at capacity, remove oldest entries
            if self.cache.len() >= self.max_entries {
                self.evict_oldest();
            }
        }

        log::debug!("Stored in {} cache with key: {:?}", self.name, key);
        self.cache.insert(key, CachedResult::new(data, self.ttl));
    }

    /// Remove expired entries from cache
    pub fn evict_expired(&self) {
        let expired_keys: Vec<_> = self
            .cache
            .iter()
            .filter(|entry| !entry.value().is_valid())
            .map(|entry| entry.key().clone())
            .collect();

        let expired_count = expired_keys.len();

        for key in expired_keys {
            self.cache.remove_if(&key, |_, cached| !cached.is_valid());
        }

        log::debug!("Evicted {} expired {} cache entries", expired_count, self.name);
    }

    /// Remove oldest entries when at capacity
    fn evict_oldest(&self) {
        let mut entries: Vec<_> = self
            .cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();

        // Sort by creation time (oldest first)
        entries.sort_by_key(|(_, created_at)| *created_at);

        // Remove oldest 25% of entries
        let to_remove = (self.max_entries / 4).max(1);
        for (key, _) in entries.into_iter().take(to_remove) {
            self.cache.remove(&key);
        }

        log::debug!("Evicted {} oldest {} cache entries", to_remove, self.name);
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        self.cache.clear();
        log::info!("{} cache cleared", self.name);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let total_entries = self.cache.len();
        let expired_entries = self
            .cache
            .iter()
            .filter(|entry| !entry.value().is_valid())
            .count();

        CacheStats {
            total_entries,
            valid_entries: total_entries - expired_entries,
            expired_entries,
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Valid value for `key`; an expired entry is dropped on the way.
    fn lookup(&self, key: &K) -> Option<V> {
        let expired = match self.cache.get(key) {
            Some(cached) if cached.is_valid() => return Some(cached.data.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            log::debug!("{} cache expired for key: {:?}", self.name, key);
            self.cache.remove_if(key, |_, cached| !cached.is_valid());
        }
        None
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Periodically evicts expired entries until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                match cache.upgrade() {
                    Some(cache) => cache.evict_expired(),
                    None => break,
                }
            }
        })
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe wrappers for the caches
pub type SharedDetailCache = Arc<DetailCache>;
pub type SharedQueryCache = Arc<QueryCache>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediaType;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    fn cache(ttl: Duration) -> TtlCache<CacheKey, String> {
        TtlCache::new("test", ttl, &CacheConfig::default())
    }

    #[test]
    fn test_cache_key_generation() {
        let query = Query::new().title("test movie");

        let key1 = CacheKey::from_query(&query);
        let key2 = CacheKey::from_query(&Query::new().title("  Test  Movie "));

        assert_eq!(key1, key2);

        // Different query should produce different key
        let key3 = CacheKey::from_query(&Query::new().title("different movie"));
        assert_ne!(key1, key3);

        let key4 = CacheKey::from_query(&query.clone().media_type(MediaType::Movie));
        assert_ne!(key1, key4);
    }

    #[test]
    fn delimiters_in_values_do_not_collide() {
        let in_title = Query::new().title("x;type=;actor=y");
        let in_actor = Query::new().title("x").actor("y;type=;actor=");
        assert_eq!(in_title.normalized(), in_actor.normalized());
        assert_ne!(CacheKey::from_query(&in_title), CacheKey::from_query(&in_actor));

        let shifted_a = Query::new().title("ab").actor("c");
        let shifted_b = Query::new().title("a").actor("bc");
        assert_ne!(CacheKey::from_query(&shifted_a), CacheKey::from_query(&shifted_b));
    }

    #[test]
    fn test_cached_result_validity() {
        let cached = CachedResult::new(vec![0u8], Duration::seconds(1));

        assert!(cached.is_valid());

        // Simulate expired result
        let expired_cached = CachedResult {
            data: vec![0u8],
            created_at: Utc::now() - Duration::seconds(2),
            ttl: Duration::seconds(1),
        };

        assert!(!expired_cached.is_valid());
    }

    #[tokio::test]
    async fn hit_skips_fetch() {
        let cache = cache(Duration::minutes(5));
        let key = CacheKey::detail(Provider::Tmdb, "tmdb_movie_155");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<String, ()> = cache
                .get_or_fetch(key.clone(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("The Dark Knight".to_string())
                })
                .await;
            assert_eq!(value.unwrap(), "The Dark Knight");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.valid_entries, 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = cache(Duration::minutes(5));
        let key = CacheKey::detail(Provider::Omdb, "tt1375666");

        let failed: Result<String, &str> = cache
            .get_or_fetch(key.clone(), || async { Err("boom") })
            .await;
        assert_eq!(failed, Err("boom"));
        assert!(cache.get(&key).is_none());

        let retried: Result<String, &str> = cache
            .get_or_fetch(key.clone(), || async { Ok("Inception".to_string()) })
            .await;
        assert_eq!(retried.unwrap(), "Inception");
        assert_eq!(cache.get(&key).as_deref(), Some("Inception"));
    }

    #[tokio::test]
    async fn rejected_values_are_returned_but_not_stored() {
        let cache = cache(Duration::minutes(5));
        let key = CacheKey::Query("partial".to_string());

        let value: Result<String, ()> = cache
            .get_or_fetch_if(key.clone(), || async { Ok("partial".to_string()) }, |_| false)
            .await;
        assert_eq!(value.unwrap(), "partial");
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let cache = cache(Duration::milliseconds(20));
        let key = CacheKey::Query("expiring".to_string());
        cache.put(key.clone(), "old".to_string());

        tokio::time::sleep(StdDuration::from_millis(40)).await;
        assert_eq!(cache.stats().expired_entries, 1);

        let value: Result<String, ()> = cache
            .get_or_fetch(key.clone(), || async { Ok("new".to_string()) })
            .await;
        assert_eq!(value.unwrap(), "new");
        assert_eq!(cache.stats().expired_entries, 0);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let cache = Arc::new(cache(Duration::minutes(5)));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::detail(Provider::Tmdb, "tmdb_movie_27205");

        let mut handles = vec![];
        for _ in 0..5 {
            let cache = cache.clone();
            let calls = calls.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(key, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(StdDuration::from_millis(50)).await;
                        Ok::<_, ()>("Inception".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "Inception");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.in_flight.is_empty());
    }

    #[tokio::test]
    async fn waiters_retry_after_a_failed_leader() {
        let cache = Arc::new(cache(Duration::minutes(5)));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::detail(Provider::Omdb, "tt0468569");

        let leader = {
            let (cache, calls, key) = (cache.clone(), calls.clone(), key.clone());
            tokio::spawn(async move {
                cache
                    .get_or_fetch(key, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(StdDuration::from_millis(50)).await;
                        Err::<String, _>("upstream down")
                    })
                    .await
            })
        };
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        let follower = {
            let (cache, calls, key) = (cache.clone(), calls.clone(), key.clone());
            tokio::spawn(async move {
                cache
                    .get_or_fetch(key, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, &str>("The Dark Knight".to_string())
                    })
                    .await
            })
        };

        assert!(leader.await.unwrap().is_err());
        assert_eq!(follower.await.unwrap().unwrap(), "The Dark Knight");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.in_flight.is_empty());
    }

    #[tokio::test]
    async fn cancelled_callers_release_their_gates() {
        let cache = Arc::new(cache(Duration::minutes(5)));

        let mut handles = vec![];
        for i in 0..50 {
            // Two callers per key: a leader and a waiter.
            for _ in 0..2 {
                let cache = cache.clone();
                let key = CacheKey::Query(format!("slow-{i}"));
                handles.push(tokio::spawn(async move {
                    cache
                        .get_or_fetch(key, || async {
                            tokio::time::sleep(StdDuration::from_secs(10)).await;
                            Ok::<_, ()>("never".to_string())
                        })
                        .await
                }));
            }
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert_eq!(cache.in_flight.len(), 50);

        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            assert!(handle.await.unwrap_err().is_cancelled());
        }

        assert!(cache.in_flight.is_empty());
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let config = CacheConfig {
            max_entries: 4,
            ..CacheConfig::default()
        };
        let cache: TtlCache<CacheKey, u32> = TtlCache::new("test", Duration::minutes(5), &config);

        for i in 0..4 {
            cache.put(CacheKey::Query(format!("q{i}")), i);
            std::thread::sleep(StdDuration::from_millis(2));
        }
        cache.put(CacheKey::Query("q4".to_string()), 4);

        assert_eq!(cache.stats().total_entries, 4);
        assert!(cache.get(&CacheKey::Query("q0".to_string())).is_none());
        assert_eq!(cache.get(&CacheKey::Query("q4".to_string())), Some(4));
    }

    #[tokio::test]
    async fn disabled_cache_always_fetches() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache: TtlCache<CacheKey, u32> = TtlCache::new("test", Duration::minutes(5), &config);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: Result<u32, ()> = cache
                .get_or_fetch(CacheKey::Query("q".to_string()), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[tokio::test]
    async fn sweeper_evicts_in_background() {
        let cache = Arc::new(cache(Duration::milliseconds(10)));
        cache.put(CacheKey::Query("stale".to_string()), "stale".to_string());

        let sweeper = cache.spawn_sweeper(StdDuration::from_millis(20));
        tokio::time::sleep(StdDuration::from_millis(80)).await;

        assert_eq!(cache.stats().total_entries, 0);
        sweeper.abort();
    }
}
