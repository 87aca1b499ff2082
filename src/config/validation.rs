use crate::config::types::{Config, CookieEntry, CrawlConfig, FieldEntry, FollowEntry, HttpConfig, OutputConfig};
use crate::crawler::MAX_WORKERS;
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_http_config(&config.http)?;
    validate_follow_steps(&config.follow)?;
    validate_fields(&config.field)?;
    validate_cookies(&config.cookie)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_start_url(&config.start_url)?;
    validate_workers(config.workers)?;
    validate_limit(config.limit)?;
    validate_ignore_urls(&config.ignore_urls)?;
    Ok(())
}

/// Parses the seed URL, which must be HTTP or HTTPS
pub(crate) fn validate_start_url(start_url: &str) -> Result<Url, ConfigError> {
    let trimmed = start_url.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingStartUrl);
    }

    let url = Url::parse(trimmed).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", start_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Start URL '{}' must use HTTP or HTTPS",
            start_url
        )));
    }

    Ok(url)
}

pub(crate) fn validate_workers(workers: usize) -> Result<(), ConfigError> {
    if workers < 1 || workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, workers
        )));
    }
    Ok(())
}

pub(crate) fn validate_limit(limit: Option<usize>) -> Result<(), ConfigError> {
    if limit == Some(0) {
        return Err(ConfigError::Validation(
            "limit must be >= 1 when set".to_string(),
        ));
    }
    Ok(())
}

/// Rejects blank blacklist entries, which would match nothing useful
pub(crate) fn validate_ignore_urls<S: AsRef<str>>(entries: &[S]) -> Result<(), ConfigError> {
    if entries.iter().any(|entry| entry.as_ref().trim().is_empty()) {
        return Err(ConfigError::Validation(
            "ignore-urls entries cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates HTTP client configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    Ok(())
}

/// Validates the link plan
fn validate_follow_steps(steps: &[FollowEntry]) -> Result<(), ConfigError> {
    for (level, step) in steps.iter().enumerate() {
        validate_follow_step(level, &step.selector, step.pagination.as_deref())?;
    }
    Ok(())
}

/// Checks the selectors of one plan level
pub(crate) fn validate_follow_step(
    level: usize,
    selector: &str,
    pagination: Option<&str>,
) -> Result<(), ConfigError> {
    validate_selector(selector, &format!("follow step {}", level))?;

    if let Some(pagination) = pagination {
        validate_selector(pagination, &format!("pagination of follow step {}", level))?;
    }
    Ok(())
}

/// Validates the extraction schema
fn validate_fields(fields: &[FieldEntry]) -> Result<(), ConfigError> {
    validate_field_names(fields.iter().map(|field| field.name.as_str()))?;

    for field in fields {
        validate_selector(&field.selector, &format!("field '{}'", field.name))?;
    }

    Ok(())
}

/// Field names must be non-empty and unique within a schema
pub(crate) fn validate_field_names<'a, I>(names: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();

    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "field name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(name) {
            return Err(ConfigError::Validation(format!(
                "field '{}' is defined more than once",
                name
            )));
        }
    }

    Ok(())
}

/// Validates cookie entries
fn validate_cookies(cookies: &[CookieEntry]) -> Result<(), ConfigError> {
    for cookie in cookies {
        if cookie.name.is_empty()
            || cookie
                .name
                .chars()
                .any(|c| c == '=' || c == ';' || c.is_whitespace())
        {
            return Err(ConfigError::Validation(format!(
                "Invalid cookie name '{}'",
                cookie.name
            )));
        }

        if cookie.value.contains(';') {
            return Err(ConfigError::Validation(format!(
                "Cookie '{}' value cannot contain ';'",
                cookie.name
            )));
        }
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if matches!(&config.json_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "json-path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.database_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a CSS selector parses
fn validate_selector(selector: &str, context: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            context: context.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::LoaderKind;
    use crate::crawler::{FieldKind, SelectorType};

    fn crawl(start_url: &str) -> CrawlConfig {
        CrawlConfig {
            start_url: start_url.to_string(),
            workers: 2,
            limit: Some(10),
            loader: LoaderKind::Static,
            ignore_urls: vec![],
        }
    }

    #[test]
    fn test_validate_crawl_config() {
        assert!(validate_crawl_config(&crawl("https://example.test/list")).is_ok());
        assert!(matches!(
            validate_crawl_config(&crawl("")),
            Err(ConfigError::MissingStartUrl)
        ));
        assert!(matches!(
            validate_crawl_config(&crawl("not a url")),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(validate_crawl_config(&crawl("ftp://example.test/")).is_err());
    }

    #[test]
    fn test_validate_worker_bounds() {
        let mut config = crawl("https://example.test/");
        config.workers = 0;
        assert!(validate_crawl_config(&config).is_err());
        config.workers = 101;
        assert!(validate_crawl_config(&config).is_err());
        config.workers = 100;
        assert!(validate_crawl_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_limit() {
        let mut config = crawl("https://example.test/");
        config.limit = Some(0);
        assert!(validate_crawl_config(&config).is_err());
        config.limit = None;
        assert!(validate_crawl_config(&config).is_ok());
    }

    #[test]
    fn test_validate_selectors() {
        let steps = vec![FollowEntry {
            selector: ".item a".to_string(),
            selector_type: SelectorType::Css,
            pagination: Some("a[rel=next]".to_string()),
        }];
        assert!(validate_follow_steps(&steps).is_ok());

        let bad = vec![FollowEntry {
            selector: "a[[".to_string(),
            selector_type: SelectorType::Css,
            pagination: None,
        }];
        assert!(matches!(
            validate_follow_steps(&bad),
            Err(ConfigError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_validate_duplicate_fields() {
        let field = FieldEntry {
            name: "title".to_string(),
            selector: "h1".to_string(),
            kind: FieldKind::Text,
        };
        assert!(validate_fields(&[field.clone()]).is_ok());
        assert!(validate_fields(&[field.clone(), field]).is_err());
    }

    #[test]
    fn test_validate_cookies() {
        let ok = CookieEntry {
            name: "session".to_string(),
            value: "abc".to_string(),
        };
        let bad = CookieEntry {
            name: "bad name".to_string(),
            value: "abc".to_string(),
        };
        assert!(validate_cookies(&[ok]).is_ok());
        assert!(validate_cookies(&[bad]).is_err());
    }

    #[test]
    fn test_validate_proxy() {
        let mut config = HttpConfig::default();
        assert!(validate_http_config(&config).is_ok());
        config.proxy = Some("::nope".to_string());
        assert!(validate_http_config(&config).is_err());
    }
}
