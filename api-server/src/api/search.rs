use super::error::ApiError;
use crate::models::context::ContextPointer;
use movie_search_client::{AggregatedResponse, MediaType, Query};
use rocket::serde::json::Json;
use rocket::{get, FromForm, State};
use std::str::FromStr;

#[derive(Debug, Default, FromForm)]
pub struct SearchParams {
    title: Option<String>,
    #[field(name = "type")]
    media_type: Option<String>,
    actor: Option<String>,
    genre: Option<String>,
}

impl TryFrom<SearchParams> for Query {
    type Error = ApiError;

    fn try_from(params: SearchParams) -> Result<Self, Self::Error> {
        let media_type = match params.media_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(MediaType::from_str(raw).map_err(|_| {
                ApiError::BadRequest("Invalid 'type'. Must be 'movie' or 'series'.".to_string())
            })?),
        };

        Ok(Query {
            title: params.title,
            media_type,
            actor: params.actor,
            genre: params.genre,
        })
    }
}

/// Search every provider, filtered by the optional actor and genre.
#[get("/movies/search?<params..>")]
pub async fn search_movies(
    params: SearchParams,
    context: &State<ContextPointer>,
) -> Result<Json<AggregatedResponse>, ApiError> {
    let query = Query::try_from(params)?;
    let response = context.movie_client().search(&query).await?;
    Ok(Json(response))
}
