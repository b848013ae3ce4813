//! repo-ingest-csv: project a repository corpus into a flat CSV file
//!
//! Usage:
//!   # Read from file, output to stdout
//!   repo-ingest-csv repositories.json
//!
//!   # Read NDJSON from stdin, write to a file with space-separated topics
//!   cat repos.jsonl | repo-ingest-csv --ndjson -o repos.csv --topic-separator ' '

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use repo_ingest::logging::init_logging;
use repo_ingest::{project_json, InputFormat, TabularWriter};
use std::fs::File;
use std::io::{stdin, stdout, BufRead, BufReader, BufWriter, Write};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "repo-ingest-csv")]
#[command(about = "Project a repository corpus into CSV", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON (one repository per line)
    #[arg(long)]
    ndjson: bool,

    /// Output file (use stdout if omitted)
    #[arg(long, short = 'o')]
    output: Option<String>,

    /// Separator placed between topic names in the topics column
    #[arg(long, default_value = ";")]
    topic_separator: String,

    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let reader: Box<dyn BufRead> = if let Some(file_path) = &args.input {
        Box::new(BufReader::new(
            File::open(file_path).with_context(|| format!("Failed to open {}", file_path))?,
        ))
    } else {
        Box::new(BufReader::new(stdin()))
    };

    let output: Box<dyn Write> = if let Some(file_path) = &args.output {
        Box::new(BufWriter::new(
            File::create(file_path).with_context(|| format!("Failed to create {}", file_path))?,
        ))
    } else {
        Box::new(BufWriter::new(stdout().lock()))
    };

    let format = if args.ndjson { InputFormat::Ndjson } else { InputFormat::Array };
    let mut writer = TabularWriter::with_separator(output, args.topic_separator);
    let rows = project_json(reader, format, &mut writer)?;

    if rows == 0 {
        eprintln!("Warning: No repositories found in input");
    }
    info!(rows, "projection complete");
    Ok(())
}
