use crate::enrich::{DocSource, FetchError};
use crate::error::{IngestError, Result};
use crate::store::EnrichmentStore;
use crate::types::{split_natural_key, DocEnrichment, EnrichConfig, StoredRepository};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// A repository the enrichment pass could not complete
#[derive(Debug)]
pub struct EnrichFailure {
    pub repo: StoredRepository,
    pub error: IngestError,
}

/// Outcome of one enrichment page
#[derive(Debug, Default)]
pub struct EnrichReport {
    pub selected: usize,
    pub stored: usize,
    pub failures: Vec<EnrichFailure>,
}

/// Fetches documentation for a bounded page of stored repositories
///
/// Each repository is handled independently: a failed fetch or write is
/// recorded in the report and the page carries on with the next one.
pub struct EnrichmentFetcher<S, D> {
    store: S,
    source: D,
    page_size: usize,
    fetch_timeout: Duration,
}

impl<S: EnrichmentStore, D: DocSource> EnrichmentFetcher<S, D> {
    pub fn new(store: S, source: D, config: &EnrichConfig) -> Self {
        EnrichmentFetcher {
            store,
            source,
            page_size: config.page_size,
            fetch_timeout: config.fetch_timeout,
        }
    }

    /// Process one page. Only a failure to select the page is returned as an error.
    pub async fn run(&self) -> Result<EnrichReport> {
        let page = self.store.select_page(self.page_size).await?;
        let mut report = EnrichReport {
            selected: page.len(),
            ..EnrichReport::default()
        };

        for repo in page {
            match self.enrich_one(&repo).await {
                Ok(()) => {
                    info!(repo_id = repo.id, key = %repo.name_with_owner, "stored documentation");
                    report.stored += 1;
                }
                Err(error) => {
                    warn!(
                        repo_id = repo.id,
                        key = %repo.name_with_owner,
                        %error,
                        "skipping repository"
                    );
                    report.failures.push(EnrichFailure { repo, error });
                }
            }
        }

        Ok(report)
    }

    async fn enrich_one(&self, repo: &StoredRepository) -> Result<()> {
        let key = repo.name_with_owner.as_str();
        let (owner, name) = split_natural_key(key)?;

        let readme = self
            .bounded(key, self.source.fetch_readme(owner, name))
            .await?
            .ok_or_else(|| IngestError::RemoteFetch {
                key: key.to_string(),
                reason: "README not found".to_string(),
            })?;

        // The wiki is optional; a missing page is stored as empty text
        let wiki = self
            .bounded(key, self.source.fetch_wiki(owner, name))
            .await?
            .unwrap_or_default();

        self.store
            .upsert_docs(&DocEnrichment {
                repo_id: repo.id,
                readme,
                wiki,
            })
            .await
    }

    async fn bounded<T>(
        &self,
        key: &str,
        fetch: impl Future<Output = std::result::Result<T, FetchError>>,
    ) -> Result<T> {
        let outcome = tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .unwrap_or(Err(FetchError::Timeout(self.fetch_timeout)));
        outcome.map_err(|e| IngestError::RemoteFetch {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, UpsertGateway};
    use crate::types::RepositoryRecord;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Serves `README for <key>` unless the key is listed as failing or slow
    struct ScriptedDocs {
        failing: Vec<&'static str>,
        slow: Vec<&'static str>,
    }

    #[async_trait]
    impl DocSource for ScriptedDocs {
        async fn fetch_readme(
            &self,
            owner: &str,
            name: &str,
        ) -> std::result::Result<Option<String>, FetchError> {
            let key = format!("{}/{}", owner, name);
            if self.failing.contains(&key.as_str()) {
                return Err(FetchError::Status(500));
            }
            if self.slow.contains(&key.as_str()) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(Some(format!("README for {}", key)))
        }

        async fn fetch_wiki(
            &self,
            _owner: &str,
            _name: &str,
        ) -> std::result::Result<Option<String>, FetchError> {
            Ok(None)
        }
    }

    async fn seeded(keys: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let repos: Vec<_> = keys.iter().map(|k| RepositoryRecord::new(*k)).collect();
        store.upsert_repositories(&repos).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_abort_page() {
        let store = seeded(&["a/one", "b/two", "c/three"]).await;
        let source = ScriptedDocs { failing: vec!["b/two"], slow: vec![] };
        let fetcher = EnrichmentFetcher::new(store.clone(), source, &EnrichConfig::default());

        let report = fetcher.run().await.unwrap();
        assert_eq!(report.selected, 3);
        assert_eq!(report.stored, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].repo.name_with_owner, "b/two");
        assert!(matches!(report.failures[0].error, IngestError::RemoteFetch { .. }));

        let (first_id, _) = store.repository("a/one").unwrap();
        let (third_id, _) = store.repository("c/three").unwrap();
        assert_eq!(store.docs(first_id).unwrap().readme, "README for a/one");
        assert_eq!(store.docs(third_id).unwrap().readme, "README for c/three");
        assert!(store.docs(store.repository("b/two").unwrap().0).is_none());
    }

    #[tokio::test]
    async fn test_bad_key_is_isolated() {
        let store = seeded(&["no-separator", "a/b"]).await;
        let source = ScriptedDocs { failing: vec![], slow: vec![] };
        let fetcher = EnrichmentFetcher::new(store.clone(), source, &EnrichConfig::default());

        let report = fetcher.run().await.unwrap();
        assert_eq!(report.stored, 1);
        assert!(matches!(report.failures[0].error, IngestError::KeyFormat(_)));
    }

    #[tokio::test]
    async fn test_page_size_bounds_work() {
        let store = seeded(&["a/1", "a/2", "a/3", "a/4"]).await;
        let config = EnrichConfig { page_size: 2, ..EnrichConfig::default() };
        let source = ScriptedDocs { failing: vec![], slow: vec![] };
        let fetcher = EnrichmentFetcher::new(store, source, &config);

        let report = fetcher.run().await.unwrap();
        assert_eq!(report.selected, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let store = seeded(&["a/slow", "a/fast"]).await;
        let config = EnrichConfig {
            fetch_timeout: Duration::from_secs(5),
            ..EnrichConfig::default()
        };
        let source = ScriptedDocs { failing: vec![], slow: vec!["a/slow"] };
        let fetcher = EnrichmentFetcher::new(store, source, &config);

        let report = fetcher.run().await.unwrap();
        assert_eq!(report.stored, 1);
        match &report.failures[0].error {
            IngestError::RemoteFetch { key, reason } => {
                assert_eq!(key, "a/slow");
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
