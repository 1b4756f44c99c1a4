use super::{build_url, fetch_json, Transport};
use crate::{CanonicalMovie, ErrorKind, MediaType, Provider};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const OMDB_BASE_URL: &str = "http://www.omdbapi.com/";

#[derive(Clone, Debug)]
pub struct OmdbConfig {
    pub api_key: String,
    pub base_url: String,
    /// Call the per-title endpoint to fill genres and actors.
    pub enrich_details: bool,
}

impl Default for OmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: OMDB_BASE_URL.to_string(),
            enrich_details: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OmdbSearchResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Search", default)]
    search: Vec<Value>,
    #[serde(rename = "Error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbSearchItem {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year", default)]
    year: String,
    #[serde(rename = "imdbID")]
    imdb_id: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Poster")]
    poster: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbDetail {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Year", default)]
    year: String,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "Actors")]
    actors: Option<String>,
}

/// OMDb client. Search results never carry genres or actors.
pub struct OmdbClient {
    transport: Arc<dyn Transport>,
    config: OmdbConfig,
    timeout: Duration,
}

impl OmdbClient {
    pub fn new(transport: Arc<dyn Transport>, config: OmdbConfig, timeout: Duration) -> Self {
        Self {
            transport,
            config,
            timeout,
        }
    }

    pub fn enrich_details(&self) -> bool {
        self.config.enrich_details
    }

    pub async fn search(
        &self,
        title: &str,
        media_type: Option<MediaType>,
    ) -> Result<Vec<CanonicalMovie>, ErrorKind> {
        let kind = media_type.map(|t| t.to_string());
        let mut params = vec![("s", title), ("apikey", self.config.api_key.as_str())];
        if let Some(kind) = kind.as_deref() {
            params.push(("type", kind));
        }
        let url = build_url(&self.config.base_url, "", &params)?;

        let response: OmdbSearchResponse =
            fetch_json(self.transport.as_ref(), url, self.timeout).await?;
        if response.response != "True" {
            log::debug!(
                "OMDB returned no results for '{}': {}",
                title,
                response.error.unwrap_or_default()
            );
            return Ok(vec![]);
        }

        Ok(response
            .search
            .into_iter()
            .filter_map(|raw| {
                let item: OmdbSearchItem = match serde_json::from_value(raw) {
                    Ok(item) => item,
                    Err(e) => {
                        log::debug!("Skipping unreadable OMDB search item: {}", e);
                        return None;
                    }
                };
                let Ok(media_type) = MediaType::from_str(&item.kind) else {
                    log::debug!(
                        "Skipping OMDB {} '{}' of type {}",
                        item.imdb_id,
                        item.title,
                        item.kind
                    );
                    return None;
                };
                let movie = CanonicalMovie::new(
                    Provider::Omdb,
                    item.imdb_id,
                    item.title,
                    &item.year,
                    media_type,
                );
                Some(movie.with_poster(poster(item.poster)))
            })
            .collect())
    }

    pub async fn fetch_detail(&self, imdb_id: &str) -> Result<CanonicalMovie, ErrorKind> {
        let url = build_url(
            &self.config.base_url,
            "",
            &[("i", imdb_id), ("apikey", self.config.api_key.as_str())],
        )?;

        let detail: OmdbDetail = fetch_json(self.transport.as_ref(), url, self.timeout).await?;
        if detail.response != "True" {
            return Err(ErrorKind::Upstream(
                detail.error.unwrap_or_else(|| format!("no record for {imdb_id}")),
            ));
        }

        let title = detail
            .title
            .ok_or_else(|| ErrorKind::Malformed(format!("OMDB record {imdb_id} has no title")))?;
        let media_type = detail
            .kind
            .as_deref()
            .and_then(|kind| MediaType::from_str(kind).ok())
            .unwrap_or(MediaType::Movie);

        Ok(CanonicalMovie::new(
            Provider::Omdb,
            detail.imdb_id.unwrap_or_else(|| imdb_id.to_string()),
            title,
            &detail.year,
            media_type,
        )
        .with_poster(poster(detail.poster))
        .with_genres(split_list(detail.genre))
        .with_actors(split_list(detail.actors)))
    }
}

fn poster(raw: Option<String>) -> Option<String> {
    raw.filter(|url| url != "N/A")
}

/// OMDb packs lists as `"Action, Crime, Drama"`.
fn split_list(raw: Option<String>) -> Vec<String> {
    raw.filter(|list| list != "N/A")
        .map(|list| list.split(',').map(|item| item.trim().to_string()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde_json::json;

    fn client(mock: &Arc<MockTransport>, enrich_details: bool) -> OmdbClient {
        OmdbClient::new(
            mock.clone(),
            OmdbConfig {
                api_key: "key".to_string(),
                base_url: "http://omdb.test/".to_string(),
                enrich_details,
            },
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn maps_search_items() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            "/",
            &[("s", "Batman"), ("apikey", "key")],
            json!({
                "Response": "True",
                "totalResults": "3",
                "Search": [
                    {
                        "Title": "Batman Begins",
                        "Year": "2005",
                        "imdbID": "tt0372784",
                        "Type": "movie",
                        "Poster": "https://m.media-amazon.com/bb.jpg"
                    },
                    {
                        "Title": "Batman: The Animated Series",
                        "Year": "1992–1995",
                        "imdbID": "tt0103359",
                        "Type": "series",
                        "Poster": "N/A"
                    },
                    {
                        "Title": "Batman: Arkham City",
                        "Year": "2011",
                        "imdbID": "tt1568322",
                        "Type": "game",
                        "Poster": "N/A"
                    }
                ]
            }),
        );

        let movies = client(&mock, false).search("Batman", None).await.unwrap();

        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].external_id(), "tt0372784");
        assert_eq!(movies[0].source_api(), &Provider::Omdb);
        assert_eq!(
            movies[0].poster_url().as_deref(),
            Some("https://m.media-amazon.com/bb.jpg")
        );
        assert!(movies[0].genres().is_empty());
        assert_eq!(movies[1].media_type(), &MediaType::Series);
        assert_eq!(movies[1].year(), "1992");
        assert!(movies[1].poster_url().is_none());
    }

    #[tokio::test]
    async fn passes_type_filter() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            "/",
            &[("s", "Sherlock"), ("type", "series")],
            json!({"Response": "True", "Search": []}),
        );

        let movies = client(&mock, false)
            .search("Sherlock", Some(MediaType::Series))
            .await
            .unwrap();
        assert!(movies.is_empty());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn not_found_is_an_empty_result() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            "/",
            &[("s", "zzzzzz")],
            json!({"Response": "False", "Error": "Movie not found!"}),
        );

        assert!(client(&mock, false).search("zzzzzz", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_items_are_skipped() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            "/",
            &[("s", "Alien")],
            json!({
                "Response": "True",
                "Search": [
                    {"Title": "Alien", "Year": "1979", "Type": "movie"},
                    {
                        "Title": "Aliens",
                        "Year": "1986",
                        "imdbID": "tt0090605",
                        "Type": "movie",
                        "Poster": "N/A"
                    },
                    "garbage"
                ]
            }),
        );

        let movies = client(&mock, false).search("Alien", None).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].external_id(), "tt0090605");
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("/", &[("s", "Inception")], json!({"Search": "oops"}));

        let err = client(&mock, false).search("Inception", None).await.unwrap_err();
        assert!(matches!(err, ErrorKind::Malformed(_)));
    }

    #[tokio::test]
    async fn detail_splits_lists() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            "/",
            &[("i", "tt0468569")],
            json!({
                "Response": "True",
                "Title": "The Dark Knight",
                "Year": "2008",
                "imdbID": "tt0468569",
                "Type": "movie",
                "Poster": "N/A",
                "Genre": "Action, Crime, Drama",
                "Actors": "Christian Bale, Heath Ledger, Aaron Eckhart"
            }),
        );

        let client = client(&mock, true);
        assert!(client.enrich_details());
        let movie = client.fetch_detail("tt0468569").await.unwrap();

        assert_eq!(movie.genres(), &vec!["Action", "Crime", "Drama"]);
        assert!(movie.has_actor("heath ledger"));
        assert!(movie.poster_url().is_none());
    }

    #[tokio::test]
    async fn detail_error_response_is_an_error() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            "/",
            &[("i", "tt0000000")],
            json!({"Response": "False", "Error": "Incorrect IMDb ID."}),
        );

        let err = client(&mock, true).fetch_detail("tt0000000").await.unwrap_err();
        assert_eq!(err, ErrorKind::Upstream("Incorrect IMDb ID.".to_string()));
    }
}
