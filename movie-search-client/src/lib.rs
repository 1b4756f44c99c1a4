pub mod aggregator;
pub mod cache;
pub mod client;
mod config;
mod error;
mod movie;
mod query;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;


use aggregator::Aggregator;
use cache::{CacheKey, DetailCache, QueryCache, SharedDetailCache, SharedQueryCache};
use client::omdb::OmdbClient;
use client::tmdb::TmdbClient;
pub use client::{ProviderClient, SurfTransport, Transport};
pub use config::ClientConfig;
pub use error::{Error, ErrorKind, ProviderUnavailable};
pub use movie::{normalize_year, AggregatedResponse, CanonicalMovie, MediaType, Provider};
pub use query::Query;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

// Re-export cache types
pub use cache::{CacheConfig, CacheStats, CachedResult};

/// Query and detail cache statistics side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOverview {
    pub query: CacheStats,
    pub detail: CacheStats,
}

/// Entry point: validates a query, answers from the query cache, and falls
/// back to the [`Aggregator`] on a miss.
#[derive(Clone)]
pub struct MovieClient {
    aggregator: Arc<Aggregator>,
    query_cache: SharedQueryCache,
    detail_cache: SharedDetailCache,
}

impl Default for MovieClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl MovieClient {
    /// Create a client that talks to the real providers over HTTP
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(SurfTransport::new()))
    }

    /// Create a client on top of a custom transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let mut seen = HashSet::new();
        let providers: Vec<ProviderClient> = config
            .providers
            .iter()
            .filter(|provider| seen.insert(**provider))
            .map(|provider| match provider {
                Provider::Omdb => ProviderClient::Omdb(OmdbClient::new(
                    transport.clone(),
                    config.omdb.clone(),
                    config.request_timeout,
                )),
                Provider::Tmdb => ProviderClient::Tmdb(TmdbClient::new(
                    transport.clone(),
                    config.tmdb.clone(),
                    config.request_timeout,
                )),
            })
            .collect();

        let query_cache = Arc::new(QueryCache::new(
            "query",
            config.cache.query_ttl,
            &config.cache,
        ));
        let detail_cache = Arc::new(DetailCache::new(
            "detail",
            config.cache.detail_ttl,
            &config.cache,
        ));
        Self::with_caches(
            providers,
            query_cache,
            detail_cache,
            config.detail_concurrency,
        )
    }

    /// Create a client around existing cache instances
    pub fn with_caches(
        providers: Vec<ProviderClient>,
        query_cache: SharedQueryCache,
        detail_cache: SharedDetailCache,
        detail_concurrency: usize,
    ) -> Self {
        log::info!(
            "Initialized MovieClient with providers {:?}",
            providers.iter().map(ProviderClient::provider).collect::<Vec<_>>()
        );
        Self {
            aggregator: Arc::new(Aggregator::new(
                providers,
                detail_cache.clone(),
                detail_concurrency,
            )),
            query_cache,
            detail_cache,
        }
    }

    /// Search every provider, with caching and single-flight per query.
    ///
    /// Partial responses are returned but not cached.
    pub async fn search(&self, query: &Query) -> Result<AggregatedResponse, Error> {
        query.validate()?;

        let cache_key = CacheKey::from_query(query);
        let aggregator = &self.aggregator;
        self.query_cache
            .get_or_fetch_if(
                cache_key,
                || aggregator.search(query),
                |response| !response.is_partial(),
            )
            .await
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheOverview {
        CacheOverview {
            query: self.query_cache.stats(),
            detail: self.detail_cache.stats(),
        }
    }

    /// Clear both caches
    pub fn clear_cache(&self) {
        self.query_cache.clear();
        self.detail_cache.clear();
    }

    /// Sweep both caches in the background every `every`.
    pub fn spawn_cache_sweeper(&self, every: Duration) -> Vec<JoinHandle<()>> {
        vec![
            self.query_cache.spawn_sweeper(every),
            self.detail_cache.spawn_sweeper(every),
        ]
    }
}
