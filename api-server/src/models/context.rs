use getset::Getters;
use log::info;
use movie_search_client::MovieClient;
use std::sync::Arc;

use super::config::Config;

#[derive(Getters)]
#[get = "pub"]
pub struct Context {
    movie_client: MovieClient,
    config: Config,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let movie_client = MovieClient::new(config.client_config());

        info!(
            "Initialized MovieClient with caching \
             (query TTL: {}s, detail TTL: {}s, max entries: {})",
            config.cache().query_ttl_secs(),
            config.cache().detail_ttl_secs(),
            config.cache().max_entries()
        );

        Self::with_client(config, movie_client)
    }

    pub fn with_client(config: Config, movie_client: MovieClient) -> Self {
        Self {
            movie_client,
            config,
        }
    }
}

pub type ContextPointer = Arc<Context>;
