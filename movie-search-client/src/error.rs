use crate::Provider;
use std::time::Duration;
use thiserror::Error as ThisError;

/// Why a single upstream call failed.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("upstream reported an error: {0}")]
    Upstream(String),
    #[error("invalid external id: {0}")]
    InvalidId(String),
}

/// A provider call failed; classified at the provider client boundary.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("provider {provider} unavailable: {kind}")]
pub struct ProviderUnavailable {
    pub provider: Provider,
    pub kind: ErrorKind,
}

impl ProviderUnavailable {
    pub fn new(provider: Provider, kind: ErrorKind) -> Self {
        Self { provider, kind }
    }
}

/// Errors surfaced to callers of [`crate::MovieClient`].
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("{0}")]
    InvalidQuery(String),
    #[error("all providers are unavailable ({})", describe(.0))]
    AllProvidersUnavailable(Vec<ProviderUnavailable>),
}

fn describe(failures: &[ProviderUnavailable]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
