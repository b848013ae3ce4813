//! Relational store access
//!
//! The pipeline talks to the store only through [`UpsertGateway`] and
//! [`EnrichmentStore`]. `postgres` is the production implementation,
//! `memory` keeps the same conflict semantics in process.

pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::types::{
    DocEnrichment, PendingTopic, RepoId, RepositoryRecord, ResolvedTopic, StoredRepository,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use postgres::{DbConfig, PgGateway};

/// Natural key to surrogate id, for the repositories of one batch
pub type RepoIdMap = HashMap<String, RepoId>;

/// Bulk upserts for one flushed batch. Repositories are always upserted before their topics.
#[async_trait]
pub trait UpsertGateway: Send + Sync {
    /// Insert repositories, keeping existing rows untouched on conflict, and
    /// return the ids of exactly the submitted natural keys
    async fn upsert_repositories(&self, repositories: &[RepositoryRecord]) -> Result<RepoIdMap>;

    /// Insert the topics whose parent appears in `repo_ids`, returning how many were submitted
    async fn upsert_topics(&self, topics: &[PendingTopic], repo_ids: &RepoIdMap) -> Result<usize>;
}

/// Store access needed by the enrichment pass
#[async_trait]
pub trait EnrichmentStore: Send + Sync {
    /// A bounded page of stored repositories, never-enriched rows first
    async fn select_page(&self, limit: usize) -> Result<Vec<StoredRepository>>;

    /// Insert or overwrite the documentation of one repository
    async fn upsert_docs(&self, doc: &DocEnrichment) -> Result<()>;
}

#[async_trait]
impl<T: UpsertGateway + ?Sized> UpsertGateway for Arc<T> {
    async fn upsert_repositories(&self, repositories: &[RepositoryRecord]) -> Result<RepoIdMap> {
        (**self).upsert_repositories(repositories).await
    }

    async fn upsert_topics(&self, topics: &[PendingTopic], repo_ids: &RepoIdMap) -> Result<usize> {
        (**self).upsert_topics(topics, repo_ids).await
    }
}

#[async_trait]
impl<T: UpsertGateway + ?Sized> UpsertGateway for &T {
    async fn upsert_repositories(&self, repositories: &[RepositoryRecord]) -> Result<RepoIdMap> {
        (**self).upsert_repositories(repositories).await
    }

    async fn upsert_topics(&self, topics: &[PendingTopic], repo_ids: &RepoIdMap) -> Result<usize> {
        (**self).upsert_topics(topics, repo_ids).await
    }
}

#[async_trait]
impl<T: EnrichmentStore + ?Sized> EnrichmentStore for Arc<T> {
    async fn select_page(&self, limit: usize) -> Result<Vec<StoredRepository>> {
        (**self).select_page(limit).await
    }

    async fn upsert_docs(&self, doc: &DocEnrichment) -> Result<()> {
        (**self).upsert_docs(doc).await
    }
}

/// Attach parent ids to topics, dropping those whose parent did not resolve
///
/// Returns the resolved topics and the number of resolution misses.
pub fn resolve_topics(
    topics: &[PendingTopic],
    repo_ids: &RepoIdMap,
) -> (Vec<ResolvedTopic>, usize) {
    let mut misses = 0;
    let resolved = topics
        .iter()
        .filter_map(|pending| match repo_ids.get(&pending.repo_key) {
            Some(&repo_id) => Some(ResolvedTopic {
                repo_id,
                name: pending.topic.name.clone(),
                stars: pending.topic.stars,
            }),
            None => {
                misses += 1;
                None
            }
        })
        .collect();
    (resolved, misses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TopicRecord;

    #[test]
    fn test_resolve_topics_drops_misses() {
        let topics = vec![
            PendingTopic::new("a/b", TopicRecord::new("t1", 1)),
            PendingTopic::new("x/y", TopicRecord::new("t2", 2)),
            PendingTopic::new("a/b", TopicRecord::new("t3", 3)),
        ];
        let repo_ids: RepoIdMap = [("a/b".to_string(), 7)].into_iter().collect();

        let (resolved, misses) = resolve_topics(&topics, &repo_ids);
        assert_eq!(misses, 1);
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|t| t.repo_id == 7));
        assert_eq!(resolved[1].name, "t3");
    }
}
