//! Crawler module for staged archive traversal
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with pacing, retry and backoff
//! - Listing page count discovery
//! - Child link extraction and deduplication
//! - The bounded worker pool shared by all phases
//! - Overall harvest coordination

mod coordinator;
mod dedup;
mod fetcher;
mod links;
mod pagination;
mod scheduler;

pub use coordinator::{HarvestReport, Harvester};
pub use dedup::Deduplicator;
pub use fetcher::{
    build_http_client, FetchCause, FetchResult, FetchStatus, FetchTask, RequestExecutor,
    RetryPolicy,
};
pub use links::{extract_links, LinkShape, PageLink};
pub use pagination::{
    discover, listing_page_urls, page_count_from_summary, PageCount, PageCountSource,
    PaginationPolicy,
};
pub use scheduler::{Completed, PhaseOutcome, WorkerPool};

pub use crate::state::PageKind;

use crate::config::Config;
use crate::extract::JournalArticleExtractor;
use crate::HarvestError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete harvest with the built-in journal article extractor
///
/// This is the main entry point for a one-shot harvest. It will:
/// 1. Build the HTTP client and compile selectors and patterns
/// 2. Discover the listing page count
/// 3. Fetch listing pages, containers and leaves in turn
/// 4. Return every record and diagnostic collected
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `cancel` - Token that stops the run early
///
/// # Returns
///
/// * `Ok(HarvestReport)` - Harvest ran, possibly with per-task failures
/// * `Err(HarvestError)` - The harvest could not be set up
pub async fn harvest(
    config: &Config,
    cancel: CancellationToken,
) -> Result<HarvestReport, HarvestError> {
    let harvester = Harvester::new(config, Arc::new(JournalArticleExtractor::new()?), cancel)?;
    Ok(harvester.run().await)
}
