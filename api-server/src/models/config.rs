use chrono::Duration as ChronoDuration;
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use getset::{CopyGetters, Getters};
use movie_search_client::client::omdb::{OmdbConfig, OMDB_BASE_URL};
use movie_search_client::client::tmdb::{TmdbConfig, TMDB_BASE_URL, TMDB_IMAGE_BASE};
use movie_search_client::{CacheConfig, ClientConfig, Provider};
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use simplelog::LevelFilter;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_ENV: &str = "MOVIE_SEARCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const ENV_PREFIX: &str = "MOVIE_SEARCH_";

const DEFAULT_QUERY_TTL_SECS: u32 = 15 * 60;
const DEFAULT_DETAIL_TTL_SECS: u32 = 60 * 60;
const DEFAULT_MAX_ENTRIES: usize = 1000;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_MAX_CAST: usize = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] figment::Error),
    #[error("provider {provider} is enabled but no API key is set (use {env})")]
    MissingApiKey { provider: Provider, env: &'static str },
    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[serde_inline_default]
#[derive(Debug, Clone, Deserialize, Serialize, Getters, CopyGetters)]
pub struct OmdbSection {
    #[serde(default)]
    #[get = "pub"]
    api_key: Option<String>,
    #[serde_inline_default(OMDB_BASE_URL.to_string())]
    #[get = "pub"]
    base_url: String,
    #[serde_inline_default(false)]
    #[get_copy = "pub"]
    enrich_details: bool,
}

impl Default for OmdbSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OMDB_BASE_URL.to_string(),
            enrich_details: false,
        }
    }
}

#[serde_inline_default]
#[derive(Debug, Clone, Deserialize, Serialize, Getters, CopyGetters)]
pub struct TmdbSection {
    #[serde(default)]
    #[get = "pub"]
    api_key: Option<String>,
    #[serde_inline_default(TMDB_BASE_URL.to_string())]
    #[get = "pub"]
    base_url: String,
    #[serde_inline_default(TMDB_IMAGE_BASE.to_string())]
    #[get = "pub"]
    image_base_url: String,
    #[serde_inline_default(DEFAULT_MAX_CAST)]
    #[get_copy = "pub"]
    max_cast: usize,
}

impl Default for TmdbSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: TMDB_BASE_URL.to_string(),
            image_base_url: TMDB_IMAGE_BASE.to_string(),
            max_cast: DEFAULT_MAX_CAST,
        }
    }
}

#[serde_inline_default]
#[derive(Debug, Clone, Deserialize, Serialize, CopyGetters)]
#[get_copy = "pub"]
pub struct CacheSection {
    #[serde_inline_default(DEFAULT_QUERY_TTL_SECS)]
    query_ttl_secs: u32,
    #[serde_inline_default(DEFAULT_DETAIL_TTL_SECS)]
    detail_ttl_secs: u32,
    #[serde_inline_default(DEFAULT_MAX_ENTRIES)]
    max_entries: usize,
    #[serde_inline_default(true)]
    enabled: bool,
    #[serde_inline_default(DEFAULT_SWEEP_INTERVAL_SECS)]
    sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            query_ttl_secs: DEFAULT_QUERY_TTL_SECS,
            detail_ttl_secs: DEFAULT_DETAIL_TTL_SECS,
            max_entries: DEFAULT_MAX_ENTRIES,
            enabled: true,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl CacheSection {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Server configuration.
///
/// Layered, later wins: built-in defaults, the YAML file, `MOVIE_SEARCH_*`
/// variables (`__` separates nested keys), then `OMDB_API_KEY` and
/// `TMDB_API_KEY`.
#[serde_inline_default]
#[derive(Debug, Clone, Deserialize, Serialize, Getters)]
#[get = "pub"]
pub struct Config {
    #[serde_inline_default(Provider::all())]
    providers: Vec<Provider>,
    #[serde(default)]
    omdb: OmdbSection,
    #[serde(default)]
    tmdb: TmdbSection,
    #[serde(default)]
    cache: CacheSection,
    #[serde_inline_default(10)]
    request_timeout_secs: u64,
    #[serde_inline_default(8)]
    detail_concurrency: usize,
    #[serde_inline_default("info".to_string())]
    log_level: String,
}

impl Config {
    pub fn figment() -> Figment {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&["OMDB_API_KEY"]).map(|_| "omdb.api_key".into()))
            .merge(Env::raw().only(&["TMDB_API_KEY"]).map(|_| "tmdb.api_key".into()))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for provider in &self.providers {
            let (key, env) = match provider {
                Provider::Omdb => (&self.omdb.api_key, "OMDB_API_KEY"),
                Provider::Tmdb => (&self.tmdb.api_key, "TMDB_API_KEY"),
            };
            if key.as_deref().map_or(true, |key| key.trim().is_empty()) {
                return Err(ConfigError::MissingApiKey {
                    provider: *provider,
                    env,
                });
            }
        }
        if self.providers.is_empty() {
            return Err(ConfigError::Zero("providers"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Zero("request_timeout_secs"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(ConfigError::Zero("cache.sweep_interval_secs"));
        }
        self.log_level_filter()?;
        Ok(())
    }

    pub fn log_level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }

    /// Settings for the search core.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            providers: self.providers.clone(),
            omdb: OmdbConfig {
                api_key: self.omdb.api_key.clone().unwrap_or_default(),
                base_url: self.omdb.base_url.clone(),
                enrich_details: self.omdb.enrich_details,
            },
            tmdb: TmdbConfig {
                api_key: self.tmdb.api_key.clone().unwrap_or_default(),
                base_url: self.tmdb.base_url.clone(),
                image_base_url: self.tmdb.image_base_url.clone(),
                max_cast: self.tmdb.max_cast,
            },
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            detail_concurrency: self.detail_concurrency,
            cache: CacheConfig {
                query_ttl: ChronoDuration::seconds(i64::from(self.cache.query_ttl_secs)),
                detail_ttl: ChronoDuration::seconds(i64::from(self.cache.detail_ttl_secs)),
                max_entries: self.cache.max_entries,
                enabled: self.cache.enabled,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_with_keys_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("OMDB_API_KEY", "omdb-secret");
            jail.set_env("TMDB_API_KEY", "tmdb-secret");

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.providers(), &vec![Provider::Omdb, Provider::Tmdb]);
            assert_eq!(config.omdb().api_key().as_deref(), Some("omdb-secret"));
            assert_eq!(config.omdb().base_url(), OMDB_BASE_URL);
            assert!(!config.omdb().enrich_details());
            assert_eq!(config.tmdb().max_cast(), 5);
            assert_eq!(config.cache().query_ttl_secs(), 900);
            assert_eq!(config.cache().detail_ttl_secs(), 3600);
            assert_eq!(config.cache().max_entries(), 1000);
            assert_eq!(config.request_timeout_secs(), &10);
            assert_eq!(config.log_level_filter().map_err(|e| e.to_string())?, LevelFilter::Info);

            let client = config.client_config();
            assert_eq!(client.request_timeout, Duration::from_secs(10));
            assert_eq!(client.cache.query_ttl, ChronoDuration::minutes(15));
            assert_eq!(client.tmdb.api_key, "tmdb-secret");
            Ok(())
        });
    }

    #[test]
    fn yaml_then_prefixed_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                concat!(
                    "providers: [TMDB]\n",
                    "tmdb:\n",
                    "  api_key: from-file\n",
                    "  max_cast: 3\n",
                    "cache:\n",
                    "  query_ttl_secs: 60\n",
                    "log_level: debug\n",
                ),
            )?;
            jail.set_env("MOVIE_SEARCH_CACHE__MAX_ENTRIES", "50");
            jail.set_env("MOVIE_SEARCH_DETAIL_CONCURRENCY", "2");

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.providers(), &vec![Provider::Tmdb]);
            assert_eq!(config.tmdb().api_key().as_deref(), Some("from-file"));
            assert_eq!(config.tmdb().max_cast(), 3);
            assert_eq!(config.tmdb().base_url(), TMDB_BASE_URL);
            assert_eq!(config.cache().query_ttl_secs(), 60);
            assert_eq!(config.cache().detail_ttl_secs(), 3600);
            assert_eq!(config.cache().max_entries(), 50);
            assert_eq!(config.detail_concurrency(), &2);
            assert_eq!(config.log_level_filter().map_err(|e| e.to_string())?, LevelFilter::Debug);
            Ok(())
        });
    }

    #[test]
    fn raw_key_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "providers: [TMDB]\ntmdb:\n  api_key: from-file\n")?;
            jail.set_env(CONFIG_PATH_ENV, "custom.yaml");
            jail.set_env("TMDB_API_KEY", "from-env");

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.tmdb().api_key().as_deref(), Some("from-env"));
            Ok(())
        });
    }

    #[test]
    fn missing_key_for_enabled_provider_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "tmdb:\n  api_key: present\n")?;
            jail.set_env("OMDB_API_KEY", "");

            match Config::load() {
                Err(ConfigError::MissingApiKey { provider, env }) => {
                    assert_eq!(provider, Provider::Omdb);
                    assert_eq!(env, "OMDB_API_KEY");
                }
                other => panic!("unexpected: {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn bad_log_level_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("OMDB_API_KEY", "a");
            jail.set_env("TMDB_API_KEY", "b");
            jail.set_env("MOVIE_SEARCH_LOG_LEVEL", "loud");

            assert!(matches!(Config::load(), Err(ConfigError::InvalidLogLevel(_))));
            Ok(())
        });
    }
}
