//! Sink printing each record as one JSON line on stdout

use crate::output::traits::{Record, ScraperSink, SinkResult};
use async_trait::async_trait;
use std::io::Write;

#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScraperSink for ConsoleSink {
    async fn publish(&self, record: &Record) -> SinkResult<()> {
        let line = serde_json::to_string(record)?;
        // The lock keeps lines from concurrent workers whole
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
