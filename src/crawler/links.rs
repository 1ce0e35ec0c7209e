//! Link extraction for listing and container pages
//!
//! A [`LinkShape`] is a CSS selector identifying the anchors that lead one
//! level down the archive: listing page → container, container → leaf.

use crate::state::PageKind;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Compiled selector for one kind of child link
#[derive(Debug, Clone)]
pub struct LinkShape {
    selector: Selector,
    source: String,
}

impl LinkShape {
    /// Compiles a CSS selector
    pub fn parse(css: &str) -> Result<Self, ConfigError> {
        let selector = Selector::parse(css)
            .map_err(|e| ConfigError::InvalidSelector(format!("{}: {:?}", css, e)))?;
        Ok(Self {
            selector,
            source: css.to_string(),
        })
    }

    /// The selector text this shape was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// A child link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Absolute http(s) URL
    pub url: String,

    /// Kind of the page the link was found on
    pub found_on: PageKind,
}

/// Extracts links matching `shape` from a page, in document order
///
/// A matched element contributes its own `href` if it has one, otherwise the
/// first descendant `<a href>`. Relative links resolve against `page_url`.
/// Links with non-navigational schemes, fragment-only links and anything that
/// does not resolve to http(s) are dropped. No matches yields an empty list.
///
/// # Example
///
/// ```
/// use archive_harvest::crawler::{extract_links, LinkShape};
/// use archive_harvest::PageKind;
/// use url::Url;
///
/// let html = r#"<div class="obj_issue_summary"><a class="title" href="/issue/view/7">Vol 7</a></div>"#;
/// let page = Url::parse("https://journal.example.org/archive").unwrap();
/// let shape = LinkShape::parse(".obj_issue_summary a.title").unwrap();
///
/// let links = extract_links(html, &page, &shape, PageKind::ListingPage);
/// assert_eq!(links[0].url, "https://journal.example.org/issue/view/7");
/// ```
pub fn extract_links(
    body: &str,
    page_url: &Url,
    shape: &LinkShape,
    found_on: PageKind,
) -> Vec<PageLink> {
    let document = Html::parse_document(body);
    let Ok(descendant_anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&shape.selector)
        .filter_map(|element| href_of(element, &descendant_anchor))
        .filter_map(|href| resolve_link(href, page_url))
        .map(|url| PageLink { url, found_on })
        .collect()
}

fn href_of<'a>(element: ElementRef<'a>, descendant_anchor: &Selector) -> Option<&'a str> {
    if let Some(href) = element.value().attr("href") {
        return Some(href);
    }
    element
        .select(descendant_anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        Ok(_) => None,
        Err(e) => {
            tracing::trace!("Unresolvable link {:?} on {}: {}", href, base_url, e);
            None
        }
    }
}
