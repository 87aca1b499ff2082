use crate::crawler::{FieldKind, SelectorType};
use serde::Deserialize;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub follow: Vec<FollowEntry>,
    #[serde(default)]
    pub field: Vec<FieldEntry>,
    #[serde(default)]
    pub cookie: Vec<CookieEntry>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// URL the crawl starts from
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Number of worker loops draining the job queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of pages to visit (unbounded when absent)
    #[serde(default)]
    pub limit: Option<usize>,

    /// Which page loader fetches every page of this run
    #[serde(default)]
    pub loader: LoaderKind,

    /// URL patterns that are never enqueued
    #[serde(rename = "ignore-urls", default)]
    pub ignore_urls: Vec<String>,
}

/// Page loader selection, fixed for a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// Plain HTTP GET over a pooled client
    #[default]
    Static,
    /// Rendered in a WebDriver-controlled browser
    Browser,
}

/// Static loader (HTTP client) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Extra attempts for timeouts and 5xx responses
    #[serde(default)]
    pub retries: u32,

    /// Delay between attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Proxy every request goes through
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            proxy: None,
        }
    }
}

/// Dynamic loader (browser) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// WebDriver endpoint
    #[serde(rename = "webdriver-url", default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Extra time given to scripts after the document is complete (milliseconds)
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: true,
            settle_ms: default_settle_ms(),
        }
    }
}

/// One follow step of the link plan
#[derive(Debug, Clone, Deserialize)]
pub struct FollowEntry {
    /// Selector of the anchors to follow
    pub selector: String,

    #[serde(rename = "selector-type", default)]
    pub selector_type: SelectorType,

    /// Selector of the "next page" anchor on pages of this level
    #[serde(default)]
    pub pagination: Option<String>,
}

/// One field of the extraction schema
#[derive(Debug, Clone, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    pub selector: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
}

/// A cookie handed to the page loader before the first fetch
#[derive(Debug, Clone, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
}

/// Output sink configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Print every record to stdout
    #[serde(default)]
    pub console: bool,

    /// Append every record to this JSON-lines file
    #[serde(rename = "json-path", default)]
    pub json_path: Option<String>,

    /// Insert every record into this SQLite database
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

fn default_workers() -> usize {
    1
}

fn default_user_agent() -> String {
    format!("sumi-harvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_true() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    500
}
