use getset::Getters;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

lazy_static! {
    static ref LEADING_YEAR: Regex = Regex::new(r"^\s*(\d{4})").unwrap();
}

/// External movie-data source. Declaration order is the default priority.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Provider {
    #[serde(rename = "OMDB")]
    #[strum(serialize = "OMDB")]
    Omdb,
    #[serde(rename = "TMDB")]
    #[strum(serialize = "TMDB")]
    Tmdb,
}

impl Provider {
    pub fn all() -> Vec<Provider> {
        Provider::iter().collect()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MediaType {
    Movie,
    Series,
}

/// Provider-agnostic movie record.
///
/// `genres` and `actors` keep insertion order and ignore case-insensitive
/// duplicates. They may be empty when the source's data tier omits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[get = "pub"]
pub struct CanonicalMovie {
    title: String,
    year: String,
    #[serde(rename = "imdb_id")]
    external_id: String,
    #[serde(rename = "type")]
    media_type: MediaType,
    source_api: Provider,
    #[serde(rename = "poster")]
    poster_url: Option<String>,
    genres: Vec<String>,
    actors: Vec<String>,
    #[serde(skip)]
    linked_ids: Vec<String>,
}

impl CanonicalMovie {
    pub fn new(
        source_api: Provider,
        external_id: impl Into<String>,
        title: impl Into<String>,
        year: &str,
        media_type: MediaType,
    ) -> Self {
        Self {
            title: title.into(),
            year: normalize_year(year),
            external_id: external_id.into(),
            media_type,
            source_api,
            poster_url: None,
            genres: vec![],
            actors: vec![],
            linked_ids: vec![],
        }
    }

    pub fn with_poster(mut self, poster_url: Option<String>) -> Self {
        self.poster_url = poster_url.filter(|url| !url.trim().is_empty());
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for genre in genres {
            push_unique(&mut self.genres, genre.into());
        }
        self
    }

    pub fn with_actors<I, S>(mut self, actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for actor in actors {
            push_unique(&mut self.actors, actor.into());
        }
        self
    }

    /// Records another provider's identifier for the same title.
    pub fn with_linked_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.is_empty() && id != self.external_id && !self.linked_ids.contains(&id) {
            self.linked_ids.push(id);
        }
        self
    }

    /// Every identifier this record is known by.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.external_id.as_str()).chain(self.linked_ids.iter().map(String::as_str))
    }

    pub fn has_actor(&self, actor: &str) -> bool {
        contains_folded(&self.actors, actor)
    }

    pub fn has_genre(&self, genre: &str) -> bool {
        contains_folded(&self.genres, genre)
    }

    /// Fills gaps in `self` from a duplicate of the same title.
    pub(crate) fn absorb(&mut self, other: CanonicalMovie) {
        if self.genres.is_empty() {
            self.genres = other.genres;
        }
        if self.actors.is_empty() {
            self.actors = other.actors;
        }
        if self.poster_url.is_none() {
            self.poster_url = other.poster_url;
        }
        if self.year.is_empty() {
            self.year = other.year;
        }
        for id in std::iter::once(other.external_id).chain(other.linked_ids) {
            if id != self.external_id && !self.linked_ids.contains(&id) {
                self.linked_ids.push(id);
            }
        }
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    let value = value.trim();
    if !value.is_empty() && !contains_folded(values, value) {
        values.push(value.to_string());
    }
}

fn contains_folded(values: &[String], needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    values.iter().any(|value| value.to_lowercase() == needle)
}

/// Leading four-digit year of a year or date field, empty when unknown.
pub fn normalize_year(raw: &str) -> String {
    LEADING_YEAR
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|year| year.as_str().to_string())
        .unwrap_or_default()
}

/// Final, filtered result of one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedResponse {
    pub search_results: Vec<CanonicalMovie>,
    pub total_results: usize,
    pub response: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable_providers: Vec<Provider>,
}

impl AggregatedResponse {
    pub fn new(search_results: Vec<CanonicalMovie>, unavailable_providers: Vec<Provider>) -> Self {
        Self {
            total_results: search_results.len(),
            search_results,
            response: true,
            unavailable_providers,
        }
    }

    /// True when some provider could not contribute.
    pub fn is_partial(&self) -> bool {
        !self.unavailable_providers.is_empty()
    }
}
