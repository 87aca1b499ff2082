//! Crawler module: scheduling, fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - The job model and the shared priority job queue
//! - Link claiming for deduplication
//! - Static (HTTP) and dynamic (browser) page loaders
//! - Content and link extraction
//! - The spider orchestrating worker loops, and its builder

mod builder;
#[cfg(feature = "browser")]
mod browser;
mod job;
mod loader;
mod parser;
mod queue;
mod spider;
mod tracker;

pub use builder::{SpiderBuilder, SpiderConfig, MAX_WORKERS};
#[cfg(feature = "browser")]
pub use browser::BrowserPageLoader;
pub use job::{
    Job, LinkPathSelector, PageType, SelectorType, FOLLOW_PRIORITY_STEP, PAGINATION_PRIORITY_STEP,
};
pub use loader::{build_http_client, CookieBundle, FetchedPage, HttpPageLoader, PageLoader};
pub use parser::{extract_record, FieldKind, LinkExtractor, Schema, SchemaField};
pub use queue::{JobQueue, ScheduledJob};
pub use spider::{Spider, SpiderState};
pub use tracker::{CrawledLinkTracker, InMemoryCrawledLinkTracker};
