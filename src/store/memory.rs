//! In-process store with the same conflict semantics as the Postgres schema
//!
//! Used for `--dry-run` ingestion and as the store behind the pipeline tests.

use crate::error::{IngestError, Result};
use crate::store::{resolve_topics, EnrichmentStore, RepoIdMap, UpsertGateway};
use crate::types::{
    DocEnrichment, PendingTopic, RepoId, RepositoryRecord, ResolvedTopic, StoredRepository,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    next_id: RepoId,
    repositories: Vec<(RepoId, RepositoryRecord)>,
    ids_by_key: HashMap<String, RepoId>,
    topics: Vec<ResolvedTopic>,
    topic_keys: HashSet<(RepoId, String)>,
    docs: HashMap<RepoId, DocEnrichment>,
    fail_repository_upserts: usize,
    fail_topic_upserts: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // Every mutation completes before its guard drops, so poisoning is ignored
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `n` repository upserts fail with a store error
    pub fn fail_repository_upserts(&self, n: usize) {
        self.tables().fail_repository_upserts = n;
    }

    /// Make the next `n` topic upserts fail with a store error
    pub fn fail_topic_upserts(&self, n: usize) {
        self.tables().fail_topic_upserts = n;
    }

    pub fn repository(&self, key: &str) -> Option<(RepoId, RepositoryRecord)> {
        let tables = self.tables();
        let id = *tables.ids_by_key.get(key)?;
        tables
            .repositories
            .iter()
            .find(|(row_id, _)| *row_id == id)
            .cloned()
    }

    pub fn repository_count(&self) -> usize {
        self.tables().repositories.len()
    }

    pub fn topics(&self) -> Vec<ResolvedTopic> {
        self.tables().topics.clone()
    }

    pub fn docs(&self, repo_id: RepoId) -> Option<DocEnrichment> {
        self.tables().docs.get(&repo_id).cloned()
    }
}

fn simulated_failure(stage: &'static str) -> IngestError {
    IngestError::store(stage, sqlx::Error::Protocol("simulated store failure".to_string()))
}

#[async_trait]
impl UpsertGateway for MemoryStore {
    async fn upsert_repositories(&self, repositories: &[RepositoryRecord]) -> Result<RepoIdMap> {
        if repositories.is_empty() {
            return Ok(RepoIdMap::new());
        }

        let mut tables = self.tables();
        if tables.fail_repository_upserts > 0 {
            tables.fail_repository_upserts -= 1;
            return Err(simulated_failure("upsert repositories"));
        }

        let mut repo_ids = RepoIdMap::with_capacity(repositories.len());
        for repo in repositories {
            let id = match tables.ids_by_key.get(&repo.name_with_owner) {
                // First write wins
                Some(&id) => id,
                None => {
                    tables.next_id += 1;
                    let id = tables.next_id;
                    let mut row = repo.clone();
                    row.topics.clear();
                    tables.ids_by_key.insert(repo.name_with_owner.clone(), id);
                    tables.repositories.push((id, row));
                    id
                }
            };
            repo_ids.insert(repo.name_with_owner.clone(), id);
        }
        Ok(repo_ids)
    }

    async fn upsert_topics(&self, topics: &[PendingTopic], repo_ids: &RepoIdMap) -> Result<usize> {
        let (resolved, _misses) = resolve_topics(topics, repo_ids);
        if resolved.is_empty() {
            return Ok(0);
        }

        let mut tables = self.tables();
        if tables.fail_topic_upserts > 0 {
            tables.fail_topic_upserts -= 1;
            return Err(simulated_failure("upsert topics"));
        }

        let submitted = resolved.len();
        for topic in resolved {
            if tables.topic_keys.insert((topic.repo_id, topic.name.clone())) {
                tables.topics.push(topic);
            }
        }
        Ok(submitted)
    }
}

#[async_trait]
impl EnrichmentStore for MemoryStore {
    async fn select_page(&self, limit: usize) -> Result<Vec<StoredRepository>> {
        let tables = self.tables();
        let (fresh, enriched): (Vec<_>, Vec<_>) = tables
            .repositories
            .iter()
            .map(|(id, repo)| StoredRepository {
                id: *id,
                name_with_owner: repo.name_with_owner.clone(),
            })
            .partition(|repo| !tables.docs.contains_key(&repo.id));

        Ok(fresh.into_iter().chain(enriched).take(limit).collect())
    }

    async fn upsert_docs(&self, doc: &DocEnrichment) -> Result<()> {
        self.tables().docs.insert(doc.repo_id, doc.clone());
        Ok(())
    }
}
