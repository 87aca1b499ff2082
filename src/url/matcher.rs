use crate::url::parse_normalized;
use url::Url;

/// Checks if a host matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches:
///    - "example.com" (the bare domain)
///    - "blog.example.com" (single subdomain)
///    - "api.v2.example.com" (nested subdomains)
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "blog.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// A single blacklist entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPattern {
    /// The whole URL must equal this string
    Exact(String),
    /// The URL must start with this string (written as `prefix*`)
    Prefix(String),
    /// The URL host must match this wildcard (written as `*.example.com`)
    Host(String),
}

impl UrlPattern {
    /// Parses the textual form used in configuration files
    ///
    /// Candidates are always normalized links, so exact entries are
    /// normalized the same way and prefixes get a lowercase scheme and host.
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern.starts_with("*.") {
            UrlPattern::Host(pattern.to_lowercase())
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            UrlPattern::Prefix(lowercase_origin(prefix))
        } else {
            let exact = parse_normalized(pattern)
                .map(String::from)
                .unwrap_or_else(|_| pattern.to_string());
            UrlPattern::Exact(exact)
        }
    }

    /// Returns true if `url` is covered by this pattern
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            UrlPattern::Exact(exact) => {
                let candidate = url.as_str();
                candidate == exact || candidate.trim_end_matches('/') == exact.trim_end_matches('/')
            }
            UrlPattern::Prefix(prefix) => url.as_str().starts_with(prefix.as_str()),
            UrlPattern::Host(pattern) => url
                .host_str()
                .map(|host| matches_wildcard(pattern, host))
                .unwrap_or(false),
        }
    }
}

/// Lowercases the `scheme://host` part of a possibly partial URL
fn lowercase_origin(prefix: &str) -> String {
    let Some(scheme_end) = prefix.find("://") else {
        return prefix.to_string();
    };
    let host_start = scheme_end + 3;
    let host_end = prefix[host_start..]
        .find(['/', '?', '#'])
        .map_or(prefix.len(), |idx| host_start + idx);

    format!(
        "{}{}",
        prefix[..host_end].to_lowercase(),
        &prefix[host_end..]
    )
}

/// The set of URL patterns that must never be enqueued
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    patterns: Vec<UrlPattern>,
}

impl Blacklist {
    /// Builds a blacklist from its textual entries
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: entries
                .into_iter()
                .map(|entry| UrlPattern::parse(entry.as_ref()))
                .collect(),
        }
    }

    /// Returns true if any pattern covers `url`
    pub fn is_blocked(&self, url: &Url) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(url))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_wildcard_matches_bare_domain() {
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
    }

    #[test]
    fn test_wildcard_no_match_partial() {
        assert!(!matches_wildcard("*.example.com", "myexample.com"));
        assert!(!matches_wildcard("*.example.com", "example.com.org"));
    }

    #[test]
    fn test_exact_no_match() {
        assert!(!matches_wildcard("example.com", "blog.example.com"));
    }

    #[test]
    fn test_parse_patterns() {
        assert_eq!(
            UrlPattern::parse("*.ads.example"),
            UrlPattern::Host("*.ads.example".to_string())
        );
        assert_eq!(
            UrlPattern::parse("https://example.com/admin*"),
            UrlPattern::Prefix("https://example.com/admin".to_string())
        );
        assert_eq!(
            UrlPattern::parse(" https://example.com/about "),
            UrlPattern::Exact("https://example.com/about".to_string())
        );
    }

    #[test]
    fn test_exact_pattern_ignores_trailing_slash() {
        let pattern = UrlPattern::parse("https://example.com");
        assert!(pattern.matches(&url("https://example.com/")));
        assert!(!pattern.matches(&url("https://example.com/page")));
    }

    #[test]
    fn test_prefix_pattern() {
        let pattern = UrlPattern::parse("https://example.com/admin*");
        assert!(pattern.matches(&url("https://example.com/admin")));
        assert!(pattern.matches(&url("https://example.com/admin/users?id=1")));
        assert!(!pattern.matches(&url("https://example.com/public")));
    }

    #[test]
    fn test_host_pattern() {
        let pattern = UrlPattern::parse("*.tracker.net");
        assert!(pattern.matches(&url("https://cdn.tracker.net/pixel")));
        assert!(pattern.matches(&url("http://tracker.net/")));
        assert!(!pattern.matches(&url("https://nottracker.net/")));
    }

    #[test]
    fn test_blacklist_any_pattern_blocks() {
        let blacklist = Blacklist::new(["https://example.com/login", "*.ads.example"]);
        assert_eq!(blacklist.len(), 2);
        assert!(blacklist.is_blocked(&url("https://example.com/login")));
        assert!(blacklist.is_blocked(&url("https://x.ads.example/banner")));
        assert!(!blacklist.is_blocked(&url("https://example.com/item/1")));
    }

    #[test]
    fn test_empty_blacklist_blocks_nothing() {
        let blacklist = Blacklist::default();
        assert!(blacklist.is_empty());
        assert!(!blacklist.is_blocked(&url("https://example.com/")));
    }

    #[test]
    fn test_exact_pattern_matches_normalized_link() {
        let blacklist = Blacklist::new(["https://Example.com/p?b=1&a=2&utm_source=mail#top"]);
        let link = parse_normalized("https://example.com/p?a=2&b=1").unwrap();
        assert!(blacklist.is_blocked(&link));
    }

    #[test]
    fn test_prefix_pattern_host_is_case_insensitive() {
        let pattern = UrlPattern::parse("HTTPS://X.test/Admin*");
        assert_eq!(pattern, UrlPattern::Prefix("https://x.test/Admin".to_string()));
        assert!(pattern.matches(&url("https://x.test/Admin/users")));
        assert!(!pattern.matches(&url("https://x.test/admin/users")));
    }
}
