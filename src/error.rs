use thiserror::Error;

/// Errors produced while ingesting or enriching the repository corpus
#[derive(Debug, Error)]
pub enum IngestError {
    /// The input does not have the expected JSON shape. Fatal for the run.
    #[error("malformed input at element {position}: {reason}")]
    MalformedInput { position: usize, reason: String },

    /// An element with no usable natural key. The element is skipped and decoding continues.
    #[error("element {position} has no nameWithOwner, owner/name, full_name or github url")]
    MissingKey { position: usize },

    /// A bulk statement failed. Aborts the current batch.
    #[error("store write failed during {stage}: {source}")]
    StoreWrite {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// Documentation fetch failed for a single repository
    #[error("remote fetch failed for {key}: {reason}")]
    RemoteFetch { key: String, reason: String },

    /// A natural key without an `owner/name` separator
    #[error("natural key {0:?} is not of the form owner/name")]
    KeyFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub(crate) fn malformed(position: usize, reason: impl Into<String>) -> Self {
        IngestError::MalformedInput {
            position,
            reason: reason.into(),
        }
    }

    pub(crate) fn store(stage: &'static str, source: sqlx::Error) -> Self {
        IngestError::StoreWrite { stage, source }
    }

    /// Whether this error ends the whole run rather than a single item
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            IngestError::MissingKey { .. }
                | IngestError::RemoteFetch { .. }
                | IngestError::KeyFormat(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
