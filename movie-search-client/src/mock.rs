//! Scripted [`Transport`] for tests: canned JSON per route, injected
//! failures and latency, and a record of every outbound call.

use crate::{ErrorKind, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

struct Route {
    path_suffix: String,
    params: Vec<(String, String)>,
    reply: Result<Value, ErrorKind>,
}

impl Route {
    fn matches(&self, url: &Url) -> bool {
        url.path().ends_with(&self.path_suffix)
            && self.params.iter().all(|(key, value)| {
                url.query_pairs()
                    .any(|(k, v)| k == key.as_str() && v == value.as_str())
            })
    }
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<Url>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer GETs whose path ends with `path_suffix` and whose query contains
    /// every pair in `params`. Earlier routes win.
    pub fn respond(&self, path_suffix: &str, params: &[(&str, &str)], body: Value) {
        self.route(path_suffix, params, Ok(body));
    }

    pub fn fail(&self, path_suffix: &str, kind: ErrorKind) {
        self.route(path_suffix, &[], Err(kind));
    }

    /// Delay every reply, for timeout and single-flight tests.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Total outbound calls so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Highest number of calls that were awaiting a reply at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Outbound calls whose path ends with `path_suffix`.
    pub fn calls_to(&self, path_suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.path().ends_with(path_suffix))
            .count()
    }

    /// Outbound calls to `host`.
    pub fn calls_to_host(&self, host: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.host_str() == Some(host))
            .count()
    }

    fn route(&self, path_suffix: &str, params: &[(&str, &str)], reply: Result<Value, ErrorKind>) {
        self.routes.lock().unwrap().push(Route {
            path_suffix: path_suffix.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            reply,
        });
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_json(&self, url: Url) -> Result<Value, ErrorKind> {
        self.requests.lock().unwrap().push(url.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let routes = self.routes.lock().unwrap();
        routes
            .iter()
            .find(|route| route.matches(&url))
            .map(|route| route.reply.clone())
            .unwrap_or(Err(ErrorKind::Status(404)))
    }
}
