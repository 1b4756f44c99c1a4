use crate::{Error, MediaType};
use serde::{Deserialize, Serialize};

const MIN_TITLE_LENGTH: usize = 2;

/// One search request. At least one of title, actor or genre is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub title: Option<String>,
    pub media_type: Option<MediaType>,
    pub actor: Option<String>,
    pub genre: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        let title = present(&self.title);
        if title.is_none() && present(&self.actor).is_none() && present(&self.genre).is_none() {
            return Err(Error::InvalidQuery(
                "At least one of 'title', 'actor', or 'genre' must be provided.".to_string(),
            ));
        }
        if let Some(title) = title {
            if title.chars().count() < MIN_TITLE_LENGTH {
                return Err(Error::InvalidQuery(format!(
                    "'title' must be at least {} characters long.",
                    MIN_TITLE_LENGTH
                )));
            }
        }
        Ok(())
    }

    /// Term sent upstream: the title, else the actor, else the genre.
    pub fn search_term(&self) -> Option<&str> {
        present(&self.title)
            .or_else(|| present(&self.actor))
            .or_else(|| present(&self.genre))
    }

    pub fn actor_filter(&self) -> Option<&str> {
        present(&self.actor)
    }

    pub fn genre_filter(&self) -> Option<&str> {
        present(&self.genre)
    }

    /// Canonical fields in fixed order (title, type, actor, genre): trimmed,
    /// whitespace-collapsed, case-folded.
    pub fn normalized_fields(&self) -> [String; 4] {
        [
            fold(&self.title),
            self.media_type.map(|t| t.to_string()).unwrap_or_default(),
            fold(&self.actor),
            fold(&self.genre),
        ]
    }

    /// Human-readable canonical form, for logs. Not unambiguous: cache keys
    /// are built from [`normalized_fields`](Self::normalized_fields).
    pub fn normalized(&self) -> String {
        let [title, media_type, actor, genre] = self.normalized_fields();
        format!("title={title};type={media_type};actor={actor};genre={genre}")
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn fold(value: &Option<String>) -> String {
    present(value)
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .unwrap_or_default()
}
