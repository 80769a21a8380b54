//! Run-level ingestion errors
//!
//! Anything here aborts one dataset's run. Per-record problems are
//! [`Rejection`](super::validation::Rejection)s and never reach this type.

use std::time::Duration;
use thiserror::Error;

use super::sink::SinkError;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response body from {url}: {message}")]
    MalformedBody { url: String, message: String },

    #[error("failed to prepare table {table}: {source}")]
    Schema {
        table: String,
        #[source]
        source: SinkError,
    },

    #[error("failed to load into {table}: {source}")]
    Load {
        table: String,
        #[source]
        source: SinkError,
    },

    #[error("failed to publish {table}: {source}")]
    Publish {
        table: String,
        #[source]
        source: SinkError,
    },

    #[error("run exceeded {0:?}")]
    Timeout(Duration),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl IngestError {
    /// Short classification used in logs and run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Transport { .. } | IngestError::MalformedBody { .. } => "transport",
            IngestError::Schema { .. } => "schema",
            IngestError::Load { .. } => "load",
            IngestError::Publish { .. } => "publish",
            IngestError::Timeout(_) => "timeout",
            IngestError::Client(_) => "client",
        }
    }
}
