use super::{build_url, fetch_json, Transport};
use crate::{CanonicalMovie, ErrorKind, MediaType, Provider};
use futures::future::try_join;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

#[derive(Clone, Debug)]
pub struct TmdbConfig {
    pub api_key: String,
    pub base_url: String,
    pub image_base_url: String,
    /// How many top-billed cast members to keep.
    pub max_cast: usize,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: TMDB_BASE_URL.to_string(),
            image_base_url: TMDB_IMAGE_BASE.to_string(),
            max_cast: 5,
        }
    }
}

/// TMDB keeps separate id spaces for movies and tv shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TmdbKind {
    Movie,
    Tv,
}

impl TmdbKind {
    fn path(self) -> &'static str {
        match self {
            TmdbKind::Movie => "movie",
            TmdbKind::Tv => "tv",
        }
    }

    fn media_type(self) -> MediaType {
        match self {
            TmdbKind::Movie => MediaType::Movie,
            TmdbKind::Tv => MediaType::Series,
        }
    }
}

/// External id of a TMDB record, rendered as `tmdb_movie_155` / `tmdb_tv_1399`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TmdbId {
    pub kind: TmdbKind,
    pub id: u64,
}

impl fmt::Display for TmdbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tmdb_{}_{}", self.kind.path(), self.id)
    }
}

impl FromStr for TmdbId {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ErrorKind::InvalidId(s.to_string());
        let rest = s.strip_prefix("tmdb_").ok_or_else(invalid)?;
        let (kind, id) = rest.split_once('_').ok_or_else(invalid)?;
        let kind = match kind {
            "movie" => TmdbKind::Movie,
            "tv" => TmdbKind::Tv,
            _ => return Err(invalid()),
        };
        let id = id.parse().map_err(|_| invalid())?;
        Ok(TmdbId { kind, id })
    }
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

/// Movie and tv results share one shape; only the title/date keys differ.
#[derive(Debug, Deserialize)]
struct TmdbSearchItem {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbDetail {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbCredits {
    #[serde(default)]
    cast: Vec<TmdbCastMember>,
}

#[derive(Debug, Deserialize)]
struct TmdbCastMember {
    name: String,
}

/// TMDB client. Search results are partial; details and credits fill them.
pub struct TmdbClient {
    transport: Arc<dyn Transport>,
    config: TmdbConfig,
    timeout: Duration,
}

impl TmdbClient {
    pub fn new(transport: Arc<dyn Transport>, config: TmdbConfig, timeout: Duration) -> Self {
        Self {
            transport,
            config,
            timeout,
        }
    }

    /// Without a media type both id spaces are searched; movies come first.
    pub async fn search(
        &self,
        title: &str,
        media_type: Option<MediaType>,
    ) -> Result<Vec<CanonicalMovie>, ErrorKind> {
        match media_type {
            Some(MediaType::Movie) => self.search_kind(title, TmdbKind::Movie).await,
            Some(MediaType::Series) => self.search_kind(title, TmdbKind::Tv).await,
            None => {
                let (mut movies, shows) = try_join(
                    self.search_kind(title, TmdbKind::Movie),
                    self.search_kind(title, TmdbKind::Tv),
                )
                .await?;
                movies.extend(shows);
                Ok(movies)
            }
        }
    }

    async fn search_kind(
        &self,
        title: &str,
        kind: TmdbKind,
    ) -> Result<Vec<CanonicalMovie>, ErrorKind> {
        let url = build_url(
            &self.config.base_url,
            &format!("search/{}", kind.path()),
            &[("api_key", self.config.api_key.as_str()), ("query", title)],
        )?;
        let response: TmdbSearchResponse =
            fetch_json(self.transport.as_ref(), url, self.timeout).await?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|raw| {
                let item: TmdbSearchItem = match serde_json::from_value(raw) {
                    Ok(item) => item,
                    Err(e) => {
                        log::debug!("Skipping unreadable TMDB {} search item: {}", kind.path(), e);
                        return None;
                    }
                };
                let id = TmdbId { kind, id: item.id };
                let Some(title) = pick(kind, item.title, item.name) else {
                    log::debug!("Skipping TMDB {} without a title", id);
                    return None;
                };
                let date = pick(kind, item.release_date, item.first_air_date).unwrap_or_default();
                let movie = CanonicalMovie::new(
                    Provider::Tmdb,
                    id.to_string(),
                    title,
                    &date,
                    kind.media_type(),
                );
                Some(movie.with_poster(self.poster(item.poster_path)))
            })
            .collect())
    }

    pub async fn fetch_detail(&self, external_id: &str) -> Result<CanonicalMovie, ErrorKind> {
        let id: TmdbId = external_id.parse()?;
        let base = format!("{}/{}", id.kind.path(), id.id);
        let params = [("api_key", self.config.api_key.as_str())];
        let detail_url = build_url(&self.config.base_url, &base, &params)?;
        let credits_url = build_url(&self.config.base_url, &format!("{base}/credits"), &params)?;

        let (detail, credits): (TmdbDetail, TmdbCredits) = try_join(
            fetch_json(self.transport.as_ref(), detail_url, self.timeout),
            fetch_json(self.transport.as_ref(), credits_url, self.timeout),
        )
        .await?;

        if detail.id != id.id {
            return Err(ErrorKind::Malformed(format!("asked for {}, got id {}", id, detail.id)));
        }
        let title = pick(id.kind, detail.title, detail.name)
            .ok_or_else(|| ErrorKind::Malformed(format!("TMDB record {id} has no title")))?;
        let date = pick(id.kind, detail.release_date, detail.first_air_date).unwrap_or_default();

        let mut movie = CanonicalMovie::new(
            Provider::Tmdb,
            id.to_string(),
            title,
            &date,
            id.kind.media_type(),
        )
        .with_poster(self.poster(detail.poster_path))
            .with_genres(detail.genres.into_iter().map(|genre| genre.name))
            .with_actors(
                credits
                    .cast
                    .into_iter()
                    .take(self.config.max_cast)
                    .map(|member| member.name),
            );
        if let Some(imdb_id) = detail.imdb_id.filter(|imdb_id| !imdb_id.is_empty()) {
            movie = movie.with_linked_id(imdb_id);
        }
        Ok(movie)
    }

    fn poster(&self, poster_path: Option<String>) -> Option<String> {
        let base = self.config.image_base_url.trim_end_matches('/');
        poster_path.map(|path| format!("{base}{path}"))
    }
}

fn pick(kind: TmdbKind, movie_field: Option<String>, tv_field: Option<String>) -> Option<String> {
    match kind {
        TmdbKind::Movie => movie_field,
        TmdbKind::Tv => tv_field,
    }
    .filter(|value| !value.is_empty())
}
