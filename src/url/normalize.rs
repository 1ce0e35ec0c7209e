use crate::UrlError;
use url::Url;

/// Tracking query parameters that never change which document is served
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
];

/// Normalizes a URL into the form used for fetching and deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything but http/https
/// 3. Require a host (the parser already lowercases it)
/// 4. Remove the fragment (everything after #)
/// 5. Remove tracking query parameters, keeping the order of the rest
/// 6. Remove an empty query string (trailing ?)
///
/// Unlike a general-purpose canonicalizer this keeps the scheme, `www.` and
/// trailing slashes intact: the result is also the URL that gets fetched.
///
/// # Examples
///
/// ```
/// use archive_harvest::url::normalize_url;
///
/// let url = normalize_url("https://Journal.EXAMPLE.org/article/view/12#authors").unwrap();
/// assert_eq!(url.as_str(), "https://journal.example.org/article/view/12");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

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

    // The query is only re-serialized when something is removed from it
    let has_tracking = url
        .query_pairs()
        .any(|(k, _)| TRACKING_PARAMS.contains(&k.as_ref()));
    if has_tracking {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    } else if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}
