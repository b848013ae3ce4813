//! Documentation enrichment for stored repositories

pub mod fetcher;
pub mod github;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use fetcher::{EnrichFailure, EnrichReport, EnrichmentFetcher};
pub use github::GithubDocs;

/// Errors from a single remote documentation request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Remote documentation lookup by owner and repository name
///
/// `Ok(None)` means the document does not exist.
#[async_trait]
pub trait DocSource: Send + Sync {
    async fn fetch_readme(&self, owner: &str, name: &str) -> Result<Option<String>, FetchError>;

    async fn fetch_wiki(&self, owner: &str, name: &str) -> Result<Option<String>, FetchError>;
}
