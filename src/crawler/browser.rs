//! Browser-rendered page loading over WebDriver
//!
//! Pages are opened in one automated browser session, scripts run, and the
//! markup is read back once the document has settled. Fetches share the
//! session, so they are serialized.

use crate::config::BrowserConfig;
use crate::crawler::loader::{CookieBundle, FetchedPage, PageLoader};
use crate::FetchError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use thirtyfour::prelude::*;
use tokio::sync::Mutex;
use url::Url;

/// How often `document.readyState` is polled while a page loads
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest wait for `document.readyState == "complete"`
const READY_TIMEOUT: Duration = Duration::from_secs(30);

struct BrowserSession {
    driver: Option<WebDriver>,
    /// Hosts whose cookie jar already holds the bundle
    cookie_hosts: HashSet<String>,
}

/// Dynamic page loader
pub struct BrowserPageLoader {
    session: Mutex<BrowserSession>,
    settle: Duration,
}

impl BrowserPageLoader {
    /// Opens a browser session on the configured WebDriver endpoint
    pub async fn connect(config: &BrowserConfig) -> Result<Self, FetchError> {
        let browser_error = |e: WebDriverError| FetchError::Browser {
            url: config.webdriver_url.clone(),
            message: e.to_string(),
        };

        let mut caps = DesiredCapabilities::chrome();
        if config.headless {
            caps.set_headless().map_err(browser_error)?;
        }
        caps.add_chrome_arg("--disable-dev-shm-usage")
            .map_err(browser_error)?;

        let driver = WebDriver::new(&config.webdriver_url, caps)
            .await
            .map_err(browser_error)?;

        driver
            .set_page_load_timeout(READY_TIMEOUT)
            .await
            .map_err(browser_error)?;

        tracing::info!("Browser session opened on {}", config.webdriver_url);

        Ok(Self {
            session: Mutex::new(BrowserSession {
                driver: Some(driver),
                cookie_hosts: HashSet::new(),
            }),
            settle: Duration::from_millis(config.settle_ms),
        })
    }

    /// Ends the browser session
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        if let Some(driver) = session.driver.take() {
            if let Err(e) = driver.quit().await {
                tracing::error!("Error closing browser session: {}", e);
            }
        }
    }
}

#[async_trait]
impl PageLoader for BrowserPageLoader {
    async fn load(
        &self,
        url: &Url,
        cookies: Option<&CookieBundle>,
    ) -> Result<FetchedPage, FetchError> {
        let browser_error = |e: WebDriverError| FetchError::Browser {
            url: url.to_string(),
            message: e.to_string(),
        };

        let mut session = self.session.lock().await;
        let BrowserSession {
            driver,
            cookie_hosts,
        } = &mut *session;
        let driver = driver.as_ref().ok_or_else(|| FetchError::Browser {
            url: url.to_string(),
            message: "browser session is closed".to_string(),
        })?;

        driver.goto(url.as_str()).await.map_err(browser_error)?;

        // Cookies can only be set once the browser is on the cookie's host
        if let (Some(cookies), Some(host)) = (cookies.filter(|c| !c.is_empty()), url.host_str()) {
            if cookie_hosts.insert(host.to_string()) {
                for (name, value) in cookies.iter() {
                    driver
                        .add_cookie(Cookie::new(name.to_string(), value.to_string()))
                        .await
                        .map_err(browser_error)?;
                }
                driver.refresh().await.map_err(browser_error)?;
            }
        }

        let started = tokio::time::Instant::now();
        loop {
            let state = driver
                .execute("return document.readyState", Vec::new())
                .await
                .map_err(browser_error)?;
            if state.json().as_str() == Some("complete") {
                break;
            }
            if started.elapsed() >= READY_TIMEOUT {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        tokio::time::sleep(self.settle).await;

        let body = driver.source().await.map_err(browser_error)?;

        Ok(FetchedPage {
            url: url.clone(),
            status_code: 200,
            body,
        })
    }
}

impl Drop for BrowserPageLoader {
    fn drop(&mut self) {
        let driver = self.session.get_mut().driver.take();
        if let (Some(driver), Ok(handle)) = (driver, tokio::runtime::Handle::try_current()) {
            handle.spawn(async move {
                if let Err(e) = driver.quit().await {
                    tracing::error!("Error closing browser session during drop: {}", e);
                }
            });
        }
    }
}
