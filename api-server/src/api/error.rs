use log::warn;
use movie_search_client::Error as SearchError;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl ApiError {
    fn status_and_body(self) -> (Status, Value) {
        match self {
            ApiError::BadRequest(detail) | ApiError::Search(SearchError::InvalidQuery(detail)) => {
                (Status::BadRequest, json!({ "detail": detail }))
            }
            ApiError::Search(SearchError::AllProvidersUnavailable(failures)) => {
                let providers: Vec<Value> = failures
                    .iter()
                    .map(|failure| {
                        json!({
                            "provider": failure.provider,
                            "detail": failure.kind.to_string(),
                        })
                    })
                    .collect();
                (
                    Status::ServiceUnavailable,
                    json!({
                        "message": "All movie providers are currently unavailable.",
                        "providers": providers,
                    }),
                )
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        warn!("{} {} failed: {}", request.method(), request.uri(), self);
        let (status, body) = self.status_and_body();
        (status, Json(body)).respond_to(request)
    }
}
