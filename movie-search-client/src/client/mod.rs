pub mod omdb;
pub mod tmdb;

use crate::{CanonicalMovie, ErrorKind, MediaType, Provider, ProviderUnavailable};
use async_trait::async_trait;
use omdb::OmdbClient;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use surf::Client;
use tmdb::TmdbClient;
use url::Url;
use utils::surf_logging::SurfLogging;

/// Outbound HTTP seam shared by the provider clients.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and decode the body as JSON.
    async fn get_json(&self, url: Url) -> Result<Value, ErrorKind>;
}

/// [`Transport`] backed by a logging `surf` client.
#[derive(Clone)]
pub struct SurfTransport {
    http: Client,
}

impl Default for SurfTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfTransport {
    pub fn new() -> Self {
        Self {
            http: Client::new().with(SurfLogging),
        }
    }
}

#[async_trait]
impl Transport for SurfTransport {
    async fn get_json(&self, url: Url) -> Result<Value, ErrorKind> {
        let mut response = self
            .http
            .get(url.as_str())
            .header("User-Agent", "MovieSearchApp/1.0")
            .await
            .map_err(|e| ErrorKind::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ErrorKind::Status(u16::from(status)));
        }

        response
            .body_json::<Value>()
            .await
            .map_err(|e| ErrorKind::Malformed(e.to_string()))
    }
}

/// GET `url` through `transport` within `timeout` and decode into `T`.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    url: Url,
    timeout: Duration,
) -> Result<T, ErrorKind> {
    let value = tokio::time::timeout(timeout, transport.get_json(url))
        .await
        .map_err(|_| ErrorKind::Timeout(timeout))??;
    serde_json::from_value(value).map_err(|e| ErrorKind::Malformed(e.to_string()))
}

pub(crate) fn build_url(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, ErrorKind> {
    let raw = if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
    };
    Url::parse_with_params(&raw, params).map_err(|e| ErrorKind::Transport(format!("{raw}: {e}")))
}

/// The closed set of upstream movie providers.
pub enum ProviderClient {
    Omdb(OmdbClient),
    Tmdb(TmdbClient),
}

impl ProviderClient {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderClient::Omdb(_) => Provider::Omdb,
            ProviderClient::Tmdb(_) => Provider::Tmdb,
        }
    }

    /// Whether search results should be enriched through [`fetch_detail`](Self::fetch_detail).
    pub fn supports_detail(&self) -> bool {
        match self {
            ProviderClient::Omdb(client) => client.enrich_details(),
            ProviderClient::Tmdb(_) => true,
        }
    }

    /// One outbound search; records may lack genres and actors.
    pub async fn search(
        &self,
        title: &str,
        media_type: Option<MediaType>,
    ) -> Result<Vec<CanonicalMovie>, ProviderUnavailable> {
        let result = match self {
            ProviderClient::Omdb(client) => client.search(title, media_type).await,
            ProviderClient::Tmdb(client) => client.search(title, media_type).await,
        };
        result.map_err(|kind| ProviderUnavailable::new(self.provider(), kind))
    }

    /// Full record for one provider id.
    pub async fn fetch_detail(
        &self,
        external_id: &str,
    ) -> Result<CanonicalMovie, ProviderUnavailable> {
        let result = match self {
            ProviderClient::Omdb(client) => client.fetch_detail(external_id).await,
            ProviderClient::Tmdb(client) => client.fetch_detail(external_id).await,
        };
        result.map_err(|kind| ProviderUnavailable::new(self.provider(), kind))
    }
}
