//! repo-ingest-enrich: fetch README and wiki text for a page of stored repositories
//!
//! Usage:
//!   # Enrich the default page of 10 repositories
//!   GITHUB_TOKEN=... repo-ingest-enrich
//!
//!   # Larger page, shorter per-request timeout
//!   repo-ingest-enrich --page-size 50 --timeout-secs 10

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use repo_ingest::cli::DbArgs;
use repo_ingest::logging::init_logging;
use repo_ingest::{DbConfig, EnrichConfig, EnrichmentFetcher, GithubDocs, PgGateway};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "repo-ingest-enrich")]
#[command(about = "Fetch documentation for stored repositories", long_about = None)]
struct Args {
    /// Repositories to process in this run
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// REST API base URL
    #[arg(long, default_value = "https://api.github.com")]
    api_base: String,

    /// Raw content base URL for wiki pages
    #[arg(long, default_value = "https://raw.githubusercontent.com")]
    raw_base: String,

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

    let config = EnrichConfig {
        page_size: args.page_size,
        fetch_timeout: Duration::from_secs(args.timeout_secs.max(1)),
        api_base: args.api_base,
        raw_base: args.raw_base,
        ..EnrichConfig::from_env()
    };
    if config.token.is_none() {
        eprintln!("Warning: GITHUB_TOKEN is not set, requests are unauthenticated");
    }

    let db: DbConfig = args.db.into();
    let store = PgGateway::connect(&db).await.context("Failed to connect to store")?;
    let docs = GithubDocs::new(&config).context("Failed to build HTTP client")?;

    let report = EnrichmentFetcher::new(store, docs, &config)
        .run()
        .await
        .context("Failed to select repositories")?;

    for failure in &report.failures {
        eprintln!("  {}: {}", failure.repo.name_with_owner, failure.error);
    }
    println!(
        "{} selected, {} stored, {} failed",
        report.selected,
        report.stored,
        report.failures.len()
    );
    Ok(())
}
