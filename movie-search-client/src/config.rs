use crate::cache::CacheConfig;
use crate::client::omdb::OmdbConfig;
use crate::client::tmdb::TmdbConfig;
use crate::Provider;
use std::time::Duration;

/// Everything [`crate::MovieClient`] needs to talk to its providers.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Enabled providers, highest priority first.
    pub providers: Vec<Provider>,
    pub omdb: OmdbConfig,
    pub tmdb: TmdbConfig,
    /// Upper bound for every single outbound call.
    pub request_timeout: Duration,
    /// Concurrent detail fetches per provider batch.
    pub detail_concurrency: usize,
    pub cache: CacheConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            providers: Provider::all(),
            omdb: OmdbConfig::default(),
            tmdb: TmdbConfig::default(),
            request_timeout: Duration::from_secs(10),
            detail_concurrency: 8,
            cache: CacheConfig::default(),
        }
    }
}
