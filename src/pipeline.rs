//! Decode → accumulate → flush driver for the ingestion run

use crate::batch::BatchAccumulator;
use crate::error::Result;
use crate::store::UpsertGateway;
use crate::types::{Batch, IngestConfig, RepositoryRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Records decoded from the input
    pub records: usize,
    /// Batches submitted to the gateway
    pub batches: usize,
    /// Repositories whose surrogate id was resolved
    pub repositories_resolved: usize,
    pub topics_submitted: usize,
    /// Topics dropped because their parent id did not resolve
    pub topics_dropped: usize,
    /// Elements skipped because they carried no natural key
    pub skipped: usize,
    /// The run stopped early on request
    pub cancelled: bool,
}

/// Sequential ingestion: one record decoded, one record accumulated, one batch flushed at a time
pub struct IngestPipeline<G> {
    gateway: G,
    config: IngestConfig,
    cancel: Arc<AtomicBool>,
}

impl<G: UpsertGateway> IngestPipeline<G> {
    pub fn new(gateway: G, config: IngestConfig) -> Self {
        IngestPipeline {
            gateway,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag. Once set, decoding stops and the buffered batch is flushed.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Drive `records` to completion
    ///
    /// Elements without a natural key are logged and skipped. Any other decode
    /// error stops the run; records decoded before it are flushed first, then
    /// the error is returned. A store error aborts immediately.
    pub async fn run<I>(&self, records: I) -> Result<IngestStats>
    where
        I: IntoIterator<Item = Result<RepositoryRecord>>,
    {
        let mut accumulator =
            BatchAccumulator::new(self.config.batch_size, self.config.max_batch_topics);
        let mut stats = IngestStats::default();
        let mut decode_error = None;

        let mut records = records.into_iter();
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                info!(records = stats.records, "ingestion cancelled, flushing buffered batch");
                stats.cancelled = true;
                break;
            }

            let Some(record) = records.next() else {
                break;
            };
            let record = match record {
                Ok(record) => record,
                Err(e) if !e.is_fatal() => {
                    warn!(error = %e, "skipping element");
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => {
                    decode_error = Some(e);
                    break;
                }
            };

            stats.records += 1;
            if accumulator.offer(record) {
                self.flush(accumulator.drain_for_flush(), &mut stats).await?;
            }
        }

        if !accumulator.is_empty() {
            self.flush(accumulator.drain_for_flush(), &mut stats).await?;
        }

        if let Some(e) = decode_error {
            return Err(e);
        }

        info!(
            records = stats.records,
            batches = stats.batches,
            topics = stats.topics_submitted,
            dropped = stats.topics_dropped,
            skipped = stats.skipped,
            "ingestion finished"
        );
        Ok(stats)
    }

    async fn flush(&self, batch: Batch, stats: &mut IngestStats) -> Result<()> {
        let repo_ids = self.gateway.upsert_repositories(&batch.repositories).await?;
        let submitted = self.gateway.upsert_topics(&batch.topics, &repo_ids).await?;

        let dropped = batch.topics.len().saturating_sub(submitted);
        if dropped > 0 {
            warn!(dropped, "topics without a resolved repository id were skipped");
        }

        stats.batches += 1;
        stats.repositories_resolved += repo_ids.len();
        stats.topics_submitted += submitted;
        stats.topics_dropped += dropped;
        debug!(
            batch = stats.batches,
            repositories = batch.repositories.len(),
            topics = submitted,
            "batch flushed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::store::MemoryStore;
    use crate::types::TopicRecord;

    fn records(n: usize) -> Vec<Result<RepositoryRecord>> {
        (0..n)
            .map(|i| {
                Ok(RepositoryRecord::new(format!("owner/repo{}", i))
                    .with_topic(TopicRecord::new("rust", 1)))
            })
            .collect()
    }

    fn config(batch_size: usize) -> IngestConfig {
        IngestConfig {
            batch_size,
            ..IngestConfig::default()
        }
    }

    #[tokio::test]
    async fn test_flushes_full_and_partial_batches() {
        let pipeline = IngestPipeline::new(MemoryStore::new(), config(3));
        let stats = pipeline.run(records(7)).await.unwrap();

        assert_eq!(stats.records, 7);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.topics_submitted, 7);
        assert_eq!(pipeline.gateway().repository_count(), 7);
    }

    #[tokio::test]
    async fn test_cancel_still_flushes_buffered_records() {
        let cancel = Arc::new(AtomicBool::new(false));
        let pipeline =
            IngestPipeline::new(MemoryStore::new(), config(100)).with_cancel(cancel.clone());

        let flag = cancel.clone();
        let input = records(10).into_iter().enumerate().map(move |(i, r)| {
            if i == 4 {
                flag.store(true, Ordering::Relaxed);
            }
            r
        });

        // The record pulled when the flag was raised is still ingested
        let stats = pipeline.run(input).await.unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.records, 5);
        assert_eq!(stats.batches, 1);
        assert_eq!(pipeline.gateway().repository_count(), 5);
    }

    #[tokio::test]
    async fn test_cancel_before_start_pulls_nothing() {
        let cancel = Arc::new(AtomicBool::new(true));
        let pipeline = IngestPipeline::new(MemoryStore::new(), config(10)).with_cancel(cancel);

        let stats = pipeline.run(records(3)).await.unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.records, 0);
        assert_eq!(stats.batches, 0);
    }

    #[tokio::test]
    async fn test_decode_error_flushes_then_fails() {
        let mut input = records(2);
        input.push(Err(IngestError::malformed(2, "bad element")));
        input.extend(records(1));

        let pipeline = IngestPipeline::new(MemoryStore::new(), config(10));
        let err = pipeline.run(input).await.unwrap_err();

        assert!(matches!(err, IngestError::MalformedInput { position: 2, .. }));
        assert_eq!(pipeline.gateway().repository_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_key_is_skipped() {
        let mut input = records(3);
        input.insert(1, Err(IngestError::MissingKey { position: 1 }));

        let pipeline = IngestPipeline::new(MemoryStore::new(), config(10));
        let stats = pipeline.run(input).await.unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.records, 3);
        assert_eq!(pipeline.gateway().repository_count(), 3);
    }

    #[tokio::test]
    async fn test_store_error_aborts_run() {
        let store = MemoryStore::new();
        store.fail_repository_upserts(1);
        let pipeline = IngestPipeline::new(store, config(2));

        let err = pipeline.run(records(5)).await.unwrap_err();
        assert!(matches!(err, IngestError::StoreWrite { .. }));
        assert_eq!(pipeline.gateway().repository_count(), 0);
        assert!(pipeline.gateway().topics().is_empty());
    }
}
