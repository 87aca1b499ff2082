//! Configuration module for Sumi-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A file describes one crawl run: the seed URL, the link plan, the field
//! schema, the blacklist, the worker count, the visit limit and the sinks.
//!
//! # Example
//!
//! ```no_run
//! use sumi_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawl starts at: {}", config.crawl.start_url);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    BrowserConfig, Config, CookieEntry, CrawlConfig, FieldEntry, FollowEntry, HttpConfig,
    LoaderKind, OutputConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
pub(crate) use validation::{
    validate_field_names, validate_follow_step, validate_ignore_urls, validate_limit,
    validate_start_url, validate_workers,
};
