use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so record sets can be traced back to the plan that
/// produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderKind;
    use crate::crawler::FieldKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawl]
start-url = "https://example.test/list"
workers = 4
limit = 25
ignore-urls = ["https://example.test/login", "*.ads.example"]

[http]
retries = 2

[[follow]]
selector = ".item a"
pagination = "a.next"

[[field]]
name = "title"
selector = ".t"

[[field]]
name = "price"
selector = ".price"
type = "number"

[[cookie]]
name = "session"
value = "abc"

[output]
console = true
json-path = "./records.jsonl"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawl.workers, 4);
        assert_eq!(config.crawl.limit, Some(25));
        assert_eq!(config.crawl.loader, LoaderKind::Static);
        assert_eq!(config.crawl.ignore_urls.len(), 2);
        assert_eq!(config.http.retries, 2);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.follow.len(), 1);
        assert_eq!(config.follow[0].pagination.as_deref(), Some("a.next"));
        assert_eq!(config.field.len(), 2);
        assert_eq!(config.field[0].kind, FieldKind::Text);
        assert_eq!(config.field[1].kind, FieldKind::Number);
        assert_eq!(config.cookie.len(), 1);
        assert!(config.output.console);
        assert!(config.output.database_path.is_none());
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse_config(
            r#"
[crawl]
start-url = "https://example.test/"
"#,
        )
        .unwrap();

        assert_eq!(config.crawl.workers, 1);
        assert_eq!(config.crawl.limit, None);
        assert!(config.follow.is_empty());
        assert!(config.browser.headless);
        assert!(!config.output.console);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawl]
start-url = "https://example.test/"
workers = 0
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_unknown_field_type_rejected() {
        let result = parse_config(
            r#"
[crawl]
start-url = "https://example.test/"

[[field]]
name = "x"
selector = "p"
type = "color"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
