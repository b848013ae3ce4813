use crate::error::{IngestError, Result};
use std::time::Duration;

/// Store-assigned identifier of a repository row
pub type RepoId = i64;

/// A repository decoded from the corpus - exists only until its batch is flushed
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryRecord {
    /// Natural key, `owner/name`
    pub name_with_owner: String,
    pub stars: i64,
    pub forks: i64,
    pub open_issues: i64,
    pub topics: Vec<TopicRecord>,
}

impl RepositoryRecord {
    pub fn new(name_with_owner: impl Into<String>) -> Self {
        RepositoryRecord {
            name_with_owner: name_with_owner.into(),
            stars: 0,
            forks: 0,
            open_issues: 0,
            topics: Vec::new(),
        }
    }

    pub fn with_stars(mut self, stars: i64) -> Self {
        self.stars = stars;
        self
    }

    pub fn with_topic(mut self, topic: TopicRecord) -> Self {
        self.topics.push(topic);
        self
    }

    /// Split the natural key into `(owner, name)`
    pub fn owner_and_name(&self) -> Result<(&str, &str)> {
        split_natural_key(&self.name_with_owner)
    }
}

/// A topic tag attached to a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRecord {
    pub name: String,
    pub stars: i64,
}

impl TopicRecord {
    pub fn new(name: impl Into<String>, stars: i64) -> Self {
        TopicRecord {
            name: name.into(),
            stars,
        }
    }
}

/// A topic waiting for its parent's surrogate id, tagged with the parent's natural key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTopic {
    pub repo_key: String,
    pub topic: TopicRecord,
}

impl PendingTopic {
    pub fn new(repo_key: impl Into<String>, topic: TopicRecord) -> Self {
        PendingTopic {
            repo_key: repo_key.into(),
            topic,
        }
    }
}

/// A topic resolved against its parent row, ready for insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTopic {
    pub repo_id: RepoId,
    pub name: String,
    pub stars: i64,
}

/// A flush-ready working set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub repositories: Vec<RepositoryRecord>,
    pub topics: Vec<PendingTopic>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }
}

/// A repository row as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRepository {
    pub id: RepoId,
    pub name_with_owner: String,
}

/// Documentation text for one stored repository. Overwritten on conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEnrichment {
    pub repo_id: RepoId,
    pub readme: String,
    pub wiki: String,
}

/// Split an `owner/name` key. Both sides must be non-empty.
pub fn split_natural_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok((owner, name)),
        _ => Err(IngestError::KeyFormat(key.to_string())),
    }
}

/// Layout of the input corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// A single top-level JSON array
    #[default]
    Array,
    /// One JSON object per line
    Ndjson,
}

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Repository count at which a batch is flushed
    pub batch_size: usize,

    /// Topic count at which a batch is flushed early (0 = repository count only)
    pub max_batch_topics: usize,

    /// Input layout
    pub format: InputFormat,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            batch_size: 1000,
            max_batch_topics: 100_000,
            format: InputFormat::Array,
        }
    }
}

/// Configuration for the enrichment pass
#[derive(Clone)]
pub struct EnrichConfig {
    /// Number of stored repositories processed per run
    pub page_size: usize,

    /// Upper bound on each remote call
    pub fetch_timeout: Duration,

    /// Base URL of the REST API serving READMEs
    pub api_base: String,

    /// Base URL serving raw wiki pages
    pub raw_base: String,

    /// Bearer token, read from the environment
    pub token: Option<String>,
}

impl std::fmt::Debug for EnrichConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichConfig")
            .field("page_size", &self.page_size)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("api_base", &self.api_base)
            .field("raw_base", &self.raw_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        EnrichConfig {
            page_size: 10,
            fetch_timeout: Duration::from_secs(30),
            api_base: String::from("https://api.github.com"),
            raw_base: String::from("https://raw.githubusercontent.com"),
            token: None,
        }
    }
}

impl EnrichConfig {
    /// Defaults with the token taken from `GITHUB_TOKEN`
    pub fn from_env() -> Self {
        EnrichConfig {
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            ..Self::default()
        }
    }
}
