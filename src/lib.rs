//! Sumi-Harvest: a declarative crawl and scrape engine
//!
//! This crate walks a site from a seed URL along a link-following plan,
//! extracts one structured record per page according to a field schema, and
//! hands every record to the registered sinks and subscribers.

pub mod config;
pub mod crawler;
pub mod output;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Sink error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Spider cannot run while {state:?}")]
    InvalidState { state: crawler::SpiderState },

    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}' in {context}")]
    InvalidSelector { selector: String, context: String },

    #[error("Missing start URL")]
    MissingStartUrl,
}

/// Page fetch errors; each one drops the job it happened on
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Browser error for {url}: {message}")]
    Browser { url: String, message: String },

    #[error("Fetch of {url} was cancelled")]
    Cancelled { url: String },
}

/// Content and link extraction errors; scoped to a single page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No element matches '{selector}' for field '{field}'")]
    ElementNotFound { field: String, selector: String },

    #[error("Field '{field}' value '{value}' is not a valid {expected}")]
    FieldParse {
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid selector: {selector}")]
    InvalidSelector { selector: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Job, Spider, SpiderBuilder, SpiderState};
pub use output::{Record, ScraperSink};
