//! # repo-ingest - repository corpus loader
//!
//! Streams a JSON corpus of source-code repositories (natural key, star and
//! fork counts, topic tags) into a relational store in bounded batches,
//! enriches stored repositories with documentation fetched from a remote
//! API, and projects the corpus into CSV.
//!
//! ## Modules
//!
//! - **stream**: lazy decoding of a top-level JSON array (or NDJSON)
//! - **batch**: bounded accumulation of repositories and their topics
//! - **store**: bulk upserts with parent/child id resolution
//! - **pipeline**: the decode → accumulate → flush loop
//! - **enrich**: README and wiki fetching for stored repositories
//! - **project**: CSV projection
//!
//! ## Quick Start
//!
//! ```rust
//! use repo_ingest::{ingest_json, IngestConfig, MemoryStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> repo_ingest::Result<()> {
//! let input = r#"[
//!     {"nameWithOwner": "a/b", "stars": 5, "topics": [{"name": "cli", "stars": 2}]},
//!     {"owner": "c", "name": "d", "topics": []}
//! ]"#;
//!
//! let store = MemoryStore::new();
//! let stats = ingest_json(input.as_bytes(), &store, IngestConfig::default()).await?;
//! assert_eq!(stats.records, 2);
//! assert_eq!(stats.topics_submitted, 1);
//! # Ok(())
//! # }
//! ```

use std::io::BufRead;

pub mod batch;
pub mod cli;
pub mod enrich;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod project;
pub mod store;
pub mod stream;
pub mod types;

pub use batch::BatchAccumulator;
pub use enrich::{DocSource, EnrichReport, EnrichmentFetcher, GithubDocs};
pub use error::{IngestError, Result};
pub use pipeline::{IngestPipeline, IngestStats};
pub use project::TabularWriter;
pub use store::{DbConfig, EnrichmentStore, MemoryStore, PgGateway, UpsertGateway};
pub use stream::StreamDecoder;
pub use types::{
    Batch, DocEnrichment, EnrichConfig, IngestConfig, InputFormat, PendingTopic, RepoId,
    RepositoryRecord, TopicRecord,
};

/// Main entry point: stream a corpus from `reader` into `gateway`
pub async fn ingest_json<R, G>(reader: R, gateway: G, config: IngestConfig) -> Result<IngestStats>
where
    R: BufRead,
    G: UpsertGateway,
{
    let decoder = StreamDecoder::new(reader, config.format);
    IngestPipeline::new(gateway, config).run(decoder).await
}

/// Project a corpus from `reader` into CSV rows, returning the row count
pub fn project_json<R: BufRead, W: std::io::Write>(
    reader: R,
    format: InputFormat,
    writer: &mut TabularWriter<W>,
) -> anyhow::Result<usize> {
    use anyhow::Context;

    for record in StreamDecoder::new(reader, format) {
        let record = match record {
            Err(e) if !e.is_fatal() => {
                tracing::warn!(error = %e, "skipping element");
                continue;
            }
            other => other.context("Failed to decode repository")?,
        };
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(writer.rows())
}
