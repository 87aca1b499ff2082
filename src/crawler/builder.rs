//! Spider construction
//!
//! `SpiderBuilder` collects the crawl surface fluently (seed, link plan,
//! schema, blacklist, limits, collaborators) and `build` validates it once
//! into an immutable `SpiderConfig` owned by the spider.

use crate::config::{
    validate_field_names, validate_follow_step, validate_ignore_urls, validate_limit,
    validate_start_url, validate_workers, Config, HttpConfig,
};
use crate::crawler::job::LinkPathSelector;
use crate::crawler::loader::{CookieBundle, HttpPageLoader, PageLoader};
use crate::crawler::parser::{FieldKind, Schema, SchemaField};
use crate::crawler::spider::Spider;
use crate::crawler::tracker::{CrawledLinkTracker, InMemoryCrawledLinkTracker};
use crate::output::{ConsoleSink, JsonLinesSink, ScraperSink, SqliteSink};
use crate::url::{base_url_of, normalize_url, Blacklist};
use crate::{ConfigError, HarvestError};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Upper bound on worker loops per run
pub const MAX_WORKERS: usize = 100;

/// Validated, immutable description of one crawl
#[derive(Debug, Clone)]
pub struct SpiderConfig {
    start_url: Url,
    base_url: Url,
    plan: Arc<[LinkPathSelector]>,
    schema: Schema,
    blacklist: Blacklist,
    workers: usize,
    limit: Option<usize>,
    cookies: Option<CookieBundle>,
}

impl SpiderConfig {
    pub fn start_url(&self) -> &Url {
        &self.start_url
    }

    /// Base every discovered link is resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn plan(&self) -> Arc<[LinkPathSelector]> {
        Arc::clone(&self.plan)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// Worker count requested at build time
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn cookies(&self) -> Option<&CookieBundle> {
        self.cookies.as_ref()
    }
}

/// Fluent builder for a `Spider`
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::crawler::{FieldKind, SpiderBuilder};
///
/// # async fn example() -> sumi_harvest::Result<()> {
/// let spider = SpiderBuilder::new("https://example.test/catalog")
///     .paginate(".category a", "a.next")
///     .follow(".product a")
///     .field("title", "h1", FieldKind::Text)
///     .field("price", ".price", FieldKind::Number)
///     .ignore_urls(["https://example.test/admin*"])
///     .limit(100)
///     .write_to_console()
///     .build()?;
///
/// let stats = spider.run(4).await?;
/// println!("{} records", stats.records_published);
/// # Ok(())
/// # }
/// ```
pub struct SpiderBuilder {
    start_url: String,
    steps: Vec<LinkPathSelector>,
    fields: Vec<(String, String, FieldKind)>,
    ignore_urls: Vec<String>,
    workers: usize,
    limit: Option<usize>,
    cookies: CookieBundle,
    http: HttpConfig,
    loader: Option<Arc<dyn PageLoader>>,
    tracker: Option<Arc<dyn CrawledLinkTracker>>,
    sinks: Vec<Arc<dyn ScraperSink>>,
    console: bool,
    json_paths: Vec<PathBuf>,
    database_paths: Vec<PathBuf>,
}

impl SpiderBuilder {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            steps: Vec::new(),
            fields: Vec::new(),
            ignore_urls: Vec::new(),
            workers: 1,
            limit: None,
            cookies: CookieBundle::new(),
            http: HttpConfig::default(),
            loader: None,
            tracker: None,
            sinks: Vec::new(),
            console: false,
            json_paths: Vec::new(),
            database_paths: Vec::new(),
        }
    }

    /// Starts from a loaded configuration file
    ///
    /// The static loader is built from the `[http]` section. A browser run
    /// needs its loader connected by the caller and passed to `with_loader`.
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new(config.crawl.start_url.clone())
            .workers(config.crawl.workers)
            .ignore_urls(config.crawl.ignore_urls.iter().cloned())
            .http(config.http.clone());

        if let Some(limit) = config.crawl.limit {
            builder = builder.limit(limit);
        }

        for step in &config.follow {
            let mut level =
                LinkPathSelector::new(step.selector.clone()).with_selector_type(step.selector_type);
            if let Some(pagination) = &step.pagination {
                level = level.with_pagination(pagination.clone());
            }
            builder = builder.step(level);
        }

        for field in &config.field {
            builder = builder.field(field.name.clone(), field.selector.clone(), field.kind);
        }

        for cookie in &config.cookie {
            builder = builder.with_cookie(cookie.name.clone(), cookie.value.clone());
        }

        if config.output.console {
            builder = builder.write_to_console();
        }
        if let Some(path) = &config.output.json_path {
            builder = builder.write_to_json_file(path);
        }
        if let Some(path) = &config.output.database_path {
            builder = builder.write_to_database(path);
        }

        builder
    }

    /// Appends a fully described plan level
    pub fn step(mut self, step: LinkPathSelector) -> Self {
        self.steps.push(step);
        self
    }

    /// Adds a plan level following the anchors matched by `selector`
    pub fn follow(mut self, selector: impl Into<String>) -> Self {
        self.steps.push(LinkPathSelector::new(selector));
        self
    }

    /// Adds a plan level that also walks `pagination_selector` "next page" links
    pub fn paginate(
        mut self,
        selector: impl Into<String>,
        pagination_selector: impl Into<String>,
    ) -> Self {
        self.steps
            .push(LinkPathSelector::new(selector).with_pagination(pagination_selector));
        self
    }

    /// Adds a field to the extraction schema
    pub fn field(
        mut self,
        name: impl Into<String>,
        selector: impl Into<String>,
        kind: FieldKind,
    ) -> Self {
        self.fields.push((name.into(), selector.into(), kind));
        self
    }

    /// Adds blacklist patterns; matching links are never enqueued
    pub fn ignore_urls<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_urls
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Caps the number of pages fetched in the run
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the worker count reported by `SpiderConfig::workers`
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies = self.cookies.with_cookie(name, value);
        self
    }

    pub fn with_cookies(mut self, cookies: CookieBundle) -> Self {
        self.cookies = cookies;
        self
    }

    /// HTTP settings of the default static loader
    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Replaces the default static loader
    pub fn with_loader(mut self, loader: Arc<dyn PageLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Replaces the default in-memory tracker
    pub fn with_link_tracker(mut self, tracker: Arc<dyn CrawledLinkTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn add_sink(mut self, sink: Arc<dyn ScraperSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn write_to_console(mut self) -> Self {
        self.console = true;
        self
    }

    /// Appends records to a JSON-lines file, opened by `build`
    pub fn write_to_json_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_paths.push(path.into());
        self
    }

    /// Stores records in a SQLite database, opened by `build`
    pub fn write_to_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_paths.push(path.into());
        self
    }

    /// Validates everything and creates the spider
    ///
    /// Fails on an empty or non-http(s) start URL, a worker count outside
    /// 1..=100, a zero limit, an invalid selector, an empty or duplicate field
    /// name, an empty blacklist entry, or a sink that cannot be opened.
    pub fn build(self) -> Result<Spider, HarvestError> {
        let start_url = validate_start_url(&self.start_url)?;
        let start_url = normalize_url(start_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", self.start_url, e))
        })?;

        validate_workers(self.workers)?;
        validate_limit(self.limit)?;

        for (level, step) in self.steps.iter().enumerate() {
            validate_follow_step(level, &step.selector, step.pagination_selector.as_deref())?;
        }

        let schema = build_schema(&self.fields)?;

        validate_ignore_urls(&self.ignore_urls)?;
        let blacklist = Blacklist::new(&self.ignore_urls);

        let loader: Arc<dyn PageLoader> = match self.loader {
            Some(loader) => loader,
            None => Arc::new(HttpPageLoader::new(&self.http)?),
        };
        let tracker = self
            .tracker
            .unwrap_or_else(|| Arc::new(InMemoryCrawledLinkTracker::new()));

        let mut sinks = self.sinks;
        if self.console {
            sinks.push(Arc::new(ConsoleSink::new()));
        }
        for path in &self.json_paths {
            sinks.push(Arc::new(JsonLinesSink::create(path)?));
        }
        for path in &self.database_paths {
            sinks.push(Arc::new(SqliteSink::open(path)?));
        }

        let config = SpiderConfig {
            base_url: base_url_of(&start_url),
            start_url,
            plan: self.steps.into(),
            schema,
            blacklist,
            workers: self.workers,
            limit: self.limit,
            cookies: (!self.cookies.is_empty()).then_some(self.cookies),
        };

        tracing::debug!(
            "Spider built: {} plan level(s), {} field(s), {} blacklist pattern(s), {} sink(s)",
            config.plan.len(),
            config.schema.len(),
            config.blacklist.len(),
            sinks.len()
        );

        Ok(Spider::new(config, loader, tracker, sinks))
    }
}

fn build_schema(fields: &[(String, String, FieldKind)]) -> Result<Schema, ConfigError> {
    validate_field_names(fields.iter().map(|(name, _, _)| name.as_str()))?;

    let schema = fields
        .iter()
        .map(|(name, selector, kind)| {
            SchemaField::new(name.clone(), selector.clone(), *kind).map_err(|_| {
                ConfigError::InvalidSelector {
                    selector: selector.clone(),
                    context: format!("field '{}'", name),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Schema::new(schema))
}
