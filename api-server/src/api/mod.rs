mod cache_stats;
mod error;
mod search;

use crate::models::context::ContextPointer;
use rocket::serde::json::Json;
use rocket::{get, routes, Build, Rocket};
use serde_json::{json, Value};

#[get("/")]
fn index() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Movie Search API! Use /movies/search to find movies."
    }))
}

pub fn build_rocket(context: ContextPointer) -> Rocket<Build> {
    rocket::build().manage(context).mount(
        "/",
        routes![
            index,
            search::search_movies,
            cache_stats::cache_stats,
            cache_stats::clear_cache
        ],
    )
}
