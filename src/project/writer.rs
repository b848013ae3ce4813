use crate::types::RepositoryRecord;
use anyhow::{Context, Result};
use std::io::Write;

const HEADER: &[&str] = &["owner", "name", "stars", "forks", "open_issues", "topics"];

/// Writes one CSV row per repository, topics joined into a single column
pub struct TabularWriter<W: Write> {
    writer: W,
    topic_separator: String,
    header_written: bool,
    rows: usize,
}

impl<W: Write> TabularWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_separator(writer, ";")
    }

    pub fn with_separator(writer: W, topic_separator: impl Into<String>) -> Self {
        TabularWriter {
            writer,
            topic_separator: topic_separator.into(),
            header_written: false,
            rows: 0,
        }
    }

    pub fn write_record(&mut self, record: &RepositoryRecord) -> Result<()> {
        if !self.header_written {
            writeln!(self.writer, "{}", HEADER.join(",")).context("Failed to write header")?;
            self.header_written = true;
        }

        // Keys without a separator still project, with an empty owner
        let (owner, name) = record
            .owner_and_name()
            .unwrap_or(("", record.name_with_owner.as_str()));
        let topics = record
            .topics
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(self.topic_separator.as_str());

        writeln!(
            self.writer,
            "{},{},{},{},{},{}",
            escape(owner),
            escape(name),
            record.stars,
            record.forks,
            record.open_issues,
            escape(&topics)
        )
        .context("Failed to write row")?;

        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Quote a field when it contains a delimiter, quote or line break
fn escape(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}
