use crate::cache::{CacheKey, SharedDetailCache};
use crate::client::ProviderClient;
use crate::{AggregatedResponse, CanonicalMovie, Error, MediaType, ProviderUnavailable, Query};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;

/// Fans a query out to every provider and merges the answers.
pub struct Aggregator {
    providers: Vec<ProviderClient>,
    detail_cache: SharedDetailCache,
    detail_concurrency: usize,
}

impl Aggregator {
    /// `providers` are merged in the given order.
    pub fn new(
        providers: Vec<ProviderClient>,
        detail_cache: SharedDetailCache,
        detail_concurrency: usize,
    ) -> Self {
        Self {
            providers,
            detail_cache,
            detail_concurrency: detail_concurrency.max(1),
        }
    }

    pub async fn search(&self, query: &Query) -> Result<AggregatedResponse, Error> {
        let term = query
            .search_term()
            .ok_or_else(|| Error::InvalidQuery("no search criteria supplied".to_string()))?;

        let outcomes = join_all(
            self.providers
                .iter()
                .map(|provider| self.search_provider(provider, term, query.media_type)),
        )
        .await;

        let mut batches = Vec::with_capacity(outcomes.len());
        let mut failures: Vec<ProviderUnavailable> = vec![];
        for outcome in outcomes {
            match outcome {
                Ok(movies) => batches.push(movies),
                Err(failure) => {
                    log::warn!("{}", failure);
                    failures.push(failure);
                }
            }
        }

        if batches.is_empty() {
            return Err(Error::AllProvidersUnavailable(failures));
        }

        let merged = merge(batches);
        let unfiltered = merged.len();
        let results = apply_filters(merged, query);
        log::info!(
            "Search '{}' produced {} results ({} before filters, {} providers unavailable)",
            term,
            results.len(),
            unfiltered,
            failures.len()
        );

        Ok(AggregatedResponse::new(
            results,
            failures.into_iter().map(|failure| failure.provider).collect(),
        ))
    }

    async fn search_provider(
        &self,
        provider: &ProviderClient,
        term: &str,
        media_type: Option<MediaType>,
    ) -> Result<Vec<CanonicalMovie>, ProviderUnavailable> {
        let partial = provider.search(term, media_type).await?;
        if !provider.supports_detail() {
            return Ok(partial);
        }

        Ok(stream::iter(partial)
            .map(|movie| self.enrich(provider, movie))
            .buffered(self.detail_concurrency)
            .collect::<Vec<_>>()
            .await)
    }

    /// Detailed record through the detail cache; the partial one on failure.
    async fn enrich(&self, provider: &ProviderClient, movie: CanonicalMovie) -> CanonicalMovie {
        let external_id = movie.external_id().clone();
        let key = CacheKey::detail(provider.provider(), &external_id);

        let detailed = self
            .detail_cache
            .get_or_fetch(key, || provider.fetch_detail(&external_id))
            .await;
        match detailed {
            Ok(detailed) => detailed,
            Err(failure) => {
                log::warn!("Keeping partial record for {}: {}", external_id, failure);
                movie
            }
        }
    }
}

/// Concatenates batches in order, folding records that share an identifier
/// into the first one seen.
pub(crate) fn merge(batches: Vec<Vec<CanonicalMovie>>) -> Vec<CanonicalMovie> {
    let mut merged: Vec<CanonicalMovie> = vec![];
    let mut index: HashMap<String, usize> = HashMap::new();

    for movie in batches.into_iter().flatten() {
        let existing = movie.identities().find_map(|id| index.get(id).copied());
        let slot = match existing {
            Some(slot) => {
                log::debug!(
                    "Merging {} {} into {} {}",
                    movie.source_api(),
                    movie.external_id(),
                    merged[slot].source_api(),
                    merged[slot].external_id()
                );
                merged[slot].absorb(movie);
                slot
            }
            None => {
                merged.push(movie);
                merged.len() - 1
            }
        };
        for id in merged[slot].identities() {
            index.entry(id.to_string()).or_insert(slot);
        }
    }

    merged
}

/// Keeps records matching every active actor/genre filter.
pub(crate) fn apply_filters(movies: Vec<CanonicalMovie>, query: &Query) -> Vec<CanonicalMovie> {
    let actor = query.actor_filter();
    let genre = query.genre_filter();
    if actor.is_none() && genre.is_none() {
        return movies;
    }

    movies
        .into_iter()
        .filter(|movie| actor.map_or(true, |actor| movie.has_actor(actor)))
        .filter(|movie| genre.map_or(true, |genre| movie.has_genre(genre)))
        .collect()
}
