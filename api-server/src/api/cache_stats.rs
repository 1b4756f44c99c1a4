use crate::models::context::ContextPointer;
use movie_search_client::CacheStats;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use serde::Serialize;

#[derive(Serialize)]
pub struct CacheStatsResponse {
    pub cache_enabled: bool,
    pub query: CacheStats,
    pub detail: CacheStats,
}

/// Get current cache statistics
#[get("/cache/stats")]
pub fn cache_stats(context: &State<ContextPointer>) -> Json<CacheStatsResponse> {
    let overview = context.movie_client().cache_stats();

    Json(CacheStatsResponse {
        cache_enabled: context.config().cache().enabled(),
        query: overview.query,
        detail: overview.detail,
    })
}

/// Clear the cache (useful for debugging/admin)
#[post("/cache/clear")]
pub fn clear_cache(context: &State<ContextPointer>) -> Json<bool> {
    context.movie_client().clear_cache();
    Json(true)
}
