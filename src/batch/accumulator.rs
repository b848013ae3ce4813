use crate::types::{Batch, PendingTopic, RepositoryRecord};

/// Buffers decoded repositories and their topics until a flush threshold is reached
///
/// The flush threshold is primarily a repository count. An optional topic
/// count also triggers a flush so a single repository with a very large
/// topic list cannot grow the batch without bound.
#[derive(Debug)]
pub struct BatchAccumulator {
    max_repositories: usize,
    max_topics: usize,
    batch: Batch,
}

impl BatchAccumulator {
    /// `max_topics == 0` disables the topic threshold
    pub fn new(max_repositories: usize, max_topics: usize) -> Self {
        let max_repositories = max_repositories.max(1);
        BatchAccumulator {
            max_repositories,
            max_topics,
            batch: Batch {
                repositories: Vec::with_capacity(max_repositories),
                topics: Vec::new(),
            },
        }
    }

    /// Append a record, stamping each of its topics with the parent's natural key
    ///
    /// Returns true once the batch should be flushed.
    pub fn offer(&mut self, mut record: RepositoryRecord) -> bool {
        let repo_key = &record.name_with_owner;
        self.batch.topics.extend(
            record
                .topics
                .drain(..)
                .map(|topic| PendingTopic::new(repo_key.as_str(), topic)),
        );
        self.batch.repositories.push(record);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.batch.repositories.len() >= self.max_repositories
            || (self.max_topics > 0 && self.batch.topics.len() >= self.max_topics)
    }

    /// Detach everything accumulated so far and reset to empty
    pub fn drain_for_flush(&mut self) -> Batch {
        let fresh = Batch {
            repositories: Vec::with_capacity(self.max_repositories),
            topics: Vec::new(),
        };
        std::mem::replace(&mut self.batch, fresh)
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Number of buffered repositories
    pub fn len(&self) -> usize {
        self.batch.repositories.len()
    }

    pub fn topic_count(&self) -> usize {
        self.batch.topics.len()
    }
}
