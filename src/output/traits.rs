//! Sink trait and the record type it consumes

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while publishing a record
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write record: {0}")]
    Write(String),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// One structured extraction result from a single page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// URL of the page the record was extracted from
    pub url: String,

    /// Field name to typed value, in schema order
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(url: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            url: url.into(),
            fields,
        }
    }
}

/// Destination for scraped records
///
/// Sinks are called from every worker, so implementations must tolerate
/// concurrent `publish` calls. A failing sink is logged by the spider and
/// never stops the crawl.
#[async_trait]
pub trait ScraperSink: Send + Sync {
    /// Writes one record
    async fn publish(&self, record: &Record) -> SinkResult<()>;

    /// Short name used in log messages
    fn name(&self) -> &str;
}
