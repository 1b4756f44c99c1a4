use std::time::Instant;
use surf::middleware::{Middleware, Next};
use surf::{Client, Request, Response, Result};
use url::Url;

/// Query parameters whose values never reach the log output.
const SECRET_PARAMS: [&str; 3] = ["apikey", "api_key", "token"];

/// Logs every outbound request with its status and latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfLogging;

#[surf::utils::async_trait]
impl Middleware for SurfLogging {
    async fn handle(&self, req: Request, client: Client, next: Next<'_>) -> Result<Response> {
        let method = req.method();
        let url = redacted(req.url());
        let start = Instant::now();

        let res = next.run(req, client).await;
        match &res {
            Ok(response) => log::debug!(
                "{} {} -> {} ({:?})",
                method,
                url,
                response.status(),
                start.elapsed()
            ),
            Err(err) => log::warn!(
                "{} {} failed after {:?}: {}",
                method,
                url,
                start.elapsed(),
                err
            ),
        }
        res
    }
}

/// Renders `url` with credential-bearing query values masked.
pub fn redacted(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }

    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if SECRET_PARAMS.contains(&key.as_ref()) {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}
