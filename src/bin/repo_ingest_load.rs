//! repo-ingest-load: stream a repository corpus into PostgreSQL
//!
//! Usage:
//!   # Load a JSON array dump with the default batch size
//!   repo-ingest-load dataset/repositories.json
//!
//!   # NDJSON input, smaller batches
//!   repo-ingest-load --ndjson --batch-size 200 repos.jsonl
//!
//!   # Decode and resolve everything without touching the database
//!   repo-ingest-load --dry-run repositories.json

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use repo_ingest::cli::DbArgs;
use repo_ingest::logging::init_logging;
use repo_ingest::{
    DbConfig, IngestConfig, IngestPipeline, IngestStats, InputFormat, MemoryStore, PgGateway,
    StreamDecoder,
};
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "repo-ingest-load")]
#[command(
    about = "Stream a repository corpus into PostgreSQL in bounded batches",
    long_about = None
)]
struct Args {
    /// Input file containing a JSON array of repositories
    #[arg(value_name = "FILE")]
    input: String,

    /// Input is newline-delimited JSON (one repository per line)
    #[arg(long)]
    ndjson: bool,

    /// Repositories per batch
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,

    /// Topics per batch before an early flush (0 disables)
    #[arg(long, default_value_t = 100_000)]
    max_batch_topics: usize,

    /// Use an in-memory store instead of PostgreSQL
    #[arg(long)]
    dry_run: bool,

    /// Don't create missing tables before loading
    #[arg(long)]
    skip_schema: bool,

    #[command(flatten)]
    db: DbArgs,

    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = IngestConfig {
        batch_size: args.batch_size,
        max_batch_topics: args.max_batch_topics,
        format: if args.ndjson { InputFormat::Ndjson } else { InputFormat::Array },
    };

    let file = File::open(&args.input).with_context(|| format!("Failed to open {}", args.input))?;
    let reader = BufReader::new(file);

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, flushing buffered batch");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let decoder = StreamDecoder::new(reader, config.format);
    let stats = if args.dry_run {
        let store = MemoryStore::new();
        let stats = IngestPipeline::new(&store, config)
            .with_cancel(cancel)
            .run(decoder)
            .await
            .context("Ingestion failed")?;
        info!(repositories = store.repository_count(), "dry run complete");
        stats
    } else {
        let db: DbConfig = args.db.into();
        let gateway = PgGateway::connect(&db).await.context("Failed to connect to store")?;
        if !args.skip_schema {
            gateway.ensure_schema().await.context("Failed to create schema")?;
        }

        IngestPipeline::new(gateway, config)
            .with_cancel(cancel)
            .run(decoder)
            .await
            .context("Ingestion failed")?
    };

    print_stats(&stats);
    Ok(())
}

fn print_stats(stats: &IngestStats) {
    println!(
        "{} repositories in {} batches, {} topics stored, {} dropped, {} elements skipped{}",
        stats.records,
        stats.batches,
        stats.topics_submitted,
        stats.topics_dropped,
        stats.skipped,
        if stats.cancelled { " (cancelled)" } else { "" }
    );
}
