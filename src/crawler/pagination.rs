//! Listing page count discovery
//!
//! Archive listings usually print a range summary such as `1-25 of 355`.
//! Discovery reads it from the first listing page; when it is missing the
//! result degrades to a configured estimate or a single page, never an error.

use crate::config::PaginationConfig;
use crate::ConfigError;
use regex::Regex;
use scraper::{Html, Selector};
use std::fmt;

/// Compiled pagination policy
#[derive(Debug, Clone)]
pub struct PaginationPolicy {
    summary: Regex,
    next_control: Regex,
    fallback_pages: u32,
    max_pages: u32,
}

impl PaginationPolicy {
    /// `fallback_pages` is itself capped by `max_pages`
    pub fn new(summary: Regex, next_control: Regex, fallback_pages: u32, max_pages: u32) -> Self {
        let max_pages = max_pages.max(1);
        Self {
            summary,
            next_control,
            fallback_pages: fallback_pages.clamp(1, max_pages),
            max_pages,
        }
    }

    pub fn from_config(config: &PaginationConfig) -> Result<Self, ConfigError> {
        let summary = Regex::new(&config.summary_pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("summary-pattern: {}", e)))?;
        let next_control = Regex::new(&config.next_control_pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("next-control-pattern: {}", e)))?;
        Ok(Self::new(
            summary,
            next_control,
            config.fallback_page_count,
            config.max_page_count,
        ))
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }
}

/// How a page count was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCountSource {
    /// Computed from a `start-end of total` summary
    Summary { start: u64, end: u64, total: u64 },

    /// A summary was read, but it implied more than `max-page-count` pages
    SummaryCapped {
        start: u64,
        end: u64,
        total: u64,
        claimed: u64,
    },

    /// Only a next-page control was found; the configured estimate was used
    NextControlFallback,

    /// No pagination signal at all
    SinglePageAssumed,
}

/// Number of listing pages and where that number came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCount {
    pub pages: u32,
    pub source: PageCountSource,
}

impl PageCount {
    /// Returns true when the count is a guess rather than read from the page
    pub fn is_degraded(&self) -> bool {
        !matches!(self.source, PageCountSource::Summary { .. })
    }

    /// Count used when the first listing page itself could not be fetched
    pub fn unavailable() -> Self {
        Self {
            pages: 1,
            source: PageCountSource::SinglePageAssumed,
        }
    }
}

impl fmt::Display for PageCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            PageCountSource::Summary { start, end, total } => write!(
                f,
                "{} page(s) from summary {}-{} of {}",
                self.pages, start, end, total
            ),
            PageCountSource::SummaryCapped {
                start,
                end,
                total,
                claimed,
            } => write!(
                f,
                "{} page(s), capped from {} in summary {}-{} of {}",
                self.pages, claimed, start, end, total
            ),
            PageCountSource::NextControlFallback => {
                write!(f, "{} page(s) estimated from next-page control", self.pages)
            }
            PageCountSource::SinglePageAssumed => {
                write!(f, "{} page assumed (no pagination found)", self.pages)
            }
        }
    }
}

/// `ceil(total / (end - start + 1))`, or `None` for an inverted range
///
/// ```
/// use archive_harvest::crawler::page_count_from_summary;
///
/// assert_eq!(page_count_from_summary(1, 25, 355), Some(15));
/// assert_eq!(page_count_from_summary(1, 50, 169), Some(4));
/// ```
pub fn page_count_from_summary(start: u64, end: u64, total: u64) -> Option<u64> {
    if end < start {
        return None;
    }
    let page_size = end - start + 1;
    Some(total.div_ceil(page_size))
}

/// Determines how many listing pages exist from the first one
pub fn discover(first_page_body: &str, policy: &PaginationPolicy) -> PageCount {
    let document = Html::parse_document(first_page_body);
    let text = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");

    for caps in policy.summary.captures_iter(&text) {
        let numbers = (
            caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()),
            caps.get(2).and_then(|m| m.as_str().parse::<u64>().ok()),
            caps.get(3).and_then(|m| m.as_str().parse::<u64>().ok()),
        );
        let (Some(start), Some(end), Some(total)) = numbers else {
            continue;
        };
        let Some(pages) = page_count_from_summary(start, end, total) else {
            tracing::debug!("Ignoring inverted pagination range {}-{}", start, end);
            continue;
        };

        let pages = pages.max(1);
        if pages > u64::from(policy.max_pages) {
            tracing::warn!(
                "Summary {}-{} of {} implies {} listing pages; capping at {}",
                start,
                end,
                total,
                pages,
                policy.max_pages
            );
            return PageCount {
                pages: policy.max_pages,
                source: PageCountSource::SummaryCapped {
                    start,
                    end,
                    total,
                    claimed: pages,
                },
            };
        }

        return PageCount {
            pages: pages as u32,
            source: PageCountSource::Summary { start, end, total },
        };
    }

    if has_next_control(&document, &policy.next_control) {
        return PageCount {
            pages: policy.fallback_pages,
            source: PageCountSource::NextControlFallback,
        };
    }

    PageCount {
        pages: 1,
        source: PageCountSource::SinglePageAssumed,
    }
}

/// Looks for a link that reads like "next", or is marked as such
fn has_next_control(document: &Html, pattern: &Regex) -> bool {
    let Ok(links) = Selector::parse("a") else {
        return false;
    };

    document.select(&links).any(|a| {
        let element = a.value();
        let rel_next = element
            .attr("rel")
            .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("next")))
            .unwrap_or(false);
        let class_next = element.classes().any(|c| c.eq_ignore_ascii_case("next"));
        let text: String = a.text().collect();

        rel_next || class_next || pattern.is_match(text.trim())
    })
}

/// URLs of listing pages 2..=pages
///
/// Page 1 is the archive URL itself. `{archive}` expands to the archive URL
/// without a trailing slash.
pub fn listing_page_urls(archive_url: &str, template: &str, pages: u32) -> Vec<String> {
    let archive = archive_url.trim_end_matches('/');
    (2..=pages)
        .map(|page| {
            template
                .replace("{archive}", archive)
                .replace("{page}", &page.to_string())
        })
        .collect()
}
