use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Normalizes a resolved link into the form used for fetching and claiming
///
/// Two links that only differ in their fragment, tracking parameters or query
/// parameter order address the same page and must claim the same key.
///
/// # Normalization Steps
///
/// 1. Reject anything that is not HTTP or HTTPS
/// 2. Reject URLs without a host
/// 3. Remove fragment (everything after #)
/// 4. Remove tracking query parameters
/// 5. Sort remaining query parameters alphabetically
/// 6. Remove empty query string (trailing ?)
///
/// Host lowercasing and dot-segment removal are already done by the `url`
/// parser.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::normalize_url;
/// use url::Url;
///
/// let url = Url::parse("https://EXAMPLE.com/a/../page?b=2&a=1#top").unwrap();
/// assert_eq!(normalize_url(url).unwrap().as_str(), "https://example.com/page?a=1&b=2");
/// ```
pub fn normalize_url(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);

        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(filtered_params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    Ok(url)
}

/// Parses and normalizes a URL string
pub fn parse_normalized(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_url(url)
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    // Stable sort keeps repeated keys in their original order
    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
