//! Page loading
//!
//! This module defines the page loader capability and its static variant:
//! - Building the pooled HTTP client from configuration
//! - Passing the configured cookie bundle along with each request
//! - Treating non-2xx responses and timeouts as fetch failures
//! - Optional bounded retry for timeouts and 5xx responses

use crate::config::HttpConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{header, Client, Proxy};
use std::time::Duration;
use url::Url;

/// Cookies injected before the first fetch of a run
///
/// The spider never inspects it; it is handed unchanged to the loader on every
/// fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieBundle {
    cookies: Vec<(String, String)>,
}

impl CookieBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Formats the bundle as a `Cookie` request header value
    pub fn header_value(&self) -> String {
        self.iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Raw content of a fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,
    /// HTTP status code (200 for browser-rendered pages)
    pub status_code: u16,
    /// Page markup
    pub body: String,
}

/// Capability fetching the markup of a page
///
/// One implementation is chosen per run; the spider never branches on which.
#[async_trait]
pub trait PageLoader: Send + Sync {
    /// Fetches `url`, failing on network errors, timeouts and non-2xx statuses
    async fn load(
        &self,
        url: &Url,
        cookies: Option<&CookieBundle>,
    ) -> Result<FetchedPage, FetchError>;
}

/// Builds the pooled HTTP client used by the static loader
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::HttpConfig;
/// use sumi_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(120))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    builder.build()
}

/// Static page loader: one plain GET per page
#[derive(Debug, Clone)]
pub struct HttpPageLoader {
    client: Client,
    retries: u32,
    retry_delay: Duration,
}

impl HttpPageLoader {
    /// Creates a loader with a client built from `config`
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Creates a loader around an existing client, without retries
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            retries: 0,
            retry_delay: Duration::ZERO,
        }
    }

    /// Sets how many extra attempts transient failures get
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    async fn fetch_once(
        &self,
        url: &Url,
        cookies: Option<&CookieBundle>,
    ) -> Result<FetchedPage, FetchError> {
        let mut request = self.client.get(url.clone());
        if let Some(cookies) = cookies.filter(|c| !c.is_empty()) {
            request = request.header(header::COOKIE, cookies.header_value());
        }

        let response = request.send().await.map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| classify_error(url, e))?;

        Ok(FetchedPage {
            url: final_url,
            status_code: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PageLoader for HttpPageLoader {
    async fn load(
        &self,
        url: &Url,
        cookies: Option<&CookieBundle>,
    ) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url, cookies).await {
                Err(e) if attempt < self.retries && is_transient(&e) => {
                    attempt += 1;
                    tracing::debug!(
                        "Retrying {} ({}/{}) after: {}",
                        url,
                        attempt,
                        self.retries,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                result => return result,
            }
        }
    }
}

/// Maps a transport error to the fetch error taxonomy
fn classify_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

/// Timeouts and server errors may succeed on a later attempt
fn is_transient(error: &FetchError) -> bool {
    match error {
        FetchError::Timeout { .. } => true,
        FetchError::Status { status, .. } => *status >= 500,
        _ => false,
    }
}
