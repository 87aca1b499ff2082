//! URL handling module for Sumi-Harvest
//!
//! This module provides URL normalization for claim keys, resolution of links
//! against a job's base URL, and blacklist pattern matching.

mod matcher;
mod normalize;

use url::Url;

// Re-export main functions
pub use matcher::{matches_wildcard, Blacklist, UrlPattern};
pub use normalize::{normalize_url, parse_normalized};

/// Computes the base URL of a seed: its authority plus every path segment but
/// the last one
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::base_url_of;
/// use url::Url;
///
/// let seed = Url::parse("https://example.test/catalog/list?page=1").unwrap();
/// assert_eq!(base_url_of(&seed).as_str(), "https://example.test/catalog/");
/// ```
pub fn base_url_of(seed: &Url) -> Url {
    let mut base = seed.clone();
    base.set_query(None);
    base.set_fragment(None);

    let path = seed.path();
    let prefix = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    };
    base.set_path(prefix);
    base
}

/// Resolves an `href` found on a page into a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - anything that fails to resolve or normalize
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_url(absolute).ok()
}
