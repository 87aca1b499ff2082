//! Output module: where scraped records go
//!
//! This module handles:
//! - The sink capability every record destination implements
//! - Console, JSON-lines file and SQLite sinks
//! - End-of-run crawl statistics

mod console;
mod json_file;
mod sqlite_sink;
pub mod stats;
mod traits;

pub use console::ConsoleSink;
pub use json_file::JsonLinesSink;
pub use sqlite_sink::{SqliteSink, StoredRecord};
pub use stats::{print_statistics, CrawlStats};
pub use traits::{Record, ScraperSink, SinkError, SinkResult};
