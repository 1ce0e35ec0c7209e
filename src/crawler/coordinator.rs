//! Harvest coordinator - staged crawl orchestration
//!
//! Runs discovery and then three strictly sequential fan-out phases:
//! 1. Listing pages → container links
//! 2. Containers → leaf links
//! 3. Leaves → records
//!
//! Each phase runs on the bounded [`WorkerPool`] and completes before the
//! next begins. A failed task never aborts its phase; it becomes a diagnostic
//! and the run continues with whatever was discovered.

use crate::config::{validate, Config};
use crate::crawler::dedup::Deduplicator;
use crate::crawler::fetcher::{
    build_http_client, FetchCause, FetchStatus, FetchTask, RequestExecutor, RetryPolicy,
};
use crate::crawler::links::{extract_links, LinkShape};
use crate::crawler::pagination::{discover, listing_page_urls, PageCount, PaginationPolicy};
use crate::crawler::scheduler::{PhaseOutcome, WorkerPool};
use crate::extract::{Record, RecordExtractor};
use crate::state::{CrawlState, Diagnostic, DiagnosticReason, PageKind, TallySnapshot};
use crate::url::normalize_url;
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Final outcome of one harvest
#[derive(Debug, Clone)]
pub struct HarvestReport {
    /// Records from every successfully fetched and extracted leaf, unordered
    pub records: Vec<Record>,

    /// One entry per task that ended without success
    pub diagnostics: Vec<Diagnostic>,

    /// Listing page count and how it was determined
    pub pagination: PageCount,

    pub listing_pages: TallySnapshot,
    pub containers: TallySnapshot,
    pub leaves: TallySnapshot,

    /// Tasks admitted but never started because the run was cancelled
    pub skipped: usize,

    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarvestReport {
    /// Counters for one kind of page
    pub fn tally(&self, kind: PageKind) -> TallySnapshot {
        match kind {
            PageKind::ListingPage => self.listing_pages,
            PageKind::Container => self.containers,
            PageKind::Leaf => self.leaves,
        }
    }

    /// True when the listing page count was a fallback guess
    pub fn discovery_degraded(&self) -> bool {
        self.pagination.is_degraded()
    }

    /// Number of distinct leaves that produced at least one record
    pub fn unique_sources(&self) -> usize {
        self.records
            .iter()
            .map(Record::source_url)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Main harvest coordinator
///
/// Built once from a validated [`Config`]; every call to [`Harvester::run`]
/// starts from empty state.
pub struct Harvester {
    archive_url: String,
    page_url_template: String,
    pagination: PaginationPolicy,
    container_shape: LinkShape,
    leaf_shape: LinkShape,
    executor: Arc<RequestExecutor>,
    extractor: Arc<dyn RecordExtractor>,
    workers: usize,
    cancel: CancellationToken,
}

impl Harvester {
    /// Creates a harvester
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration; validated again here
    /// * `extractor` - Turns fetched leaves into records
    /// * `cancel` - Stops the run when cancelled
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to run
    /// * `Err(HarvestError)` - Invalid configuration or HTTP client failure
    pub fn new(
        config: &Config,
        extractor: Arc<dyn RecordExtractor>,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        validate(config)?;

        let archive_url = normalize_url(&config.archive.url)?;
        let client = build_http_client(&config.user_agent)?;
        let executor = RequestExecutor::new(
            client,
            RetryPolicy::from(&config.network),
            cancel.clone(),
        );

        Ok(Self {
            archive_url: archive_url.to_string(),
            page_url_template: config.archive.page_url_template.clone(),
            pagination: PaginationPolicy::from_config(&config.pagination)?,
            container_shape: LinkShape::parse(&config.links.container_selector)?,
            leaf_shape: LinkShape::parse(&config.links.leaf_selector)?,
            executor: Arc::new(executor),
            extractor,
            workers: config.network.max_workers_per_phase as usize,
            cancel,
        })
    }

    pub fn archive_url(&self) -> &str {
        &self.archive_url
    }

    /// Runs discovery and all three phases
    ///
    /// Never fails: per-task failures end up in
    /// [`HarvestReport::diagnostics`], and cancellation ends the run early
    /// with whatever was collected so far.
    pub async fn run(&self) -> HarvestReport {
        let started_at = Utc::now();
        let ctx = Arc::new(RunContext {
            executor: Arc::clone(&self.executor),
            extractor: Arc::clone(&self.extractor),
            container_shape: self.container_shape.clone(),
            leaf_shape: self.leaf_shape.clone(),
            state: CrawlState::new(),
            dedup: Deduplicator::new(),
        });
        let pool = WorkerPool::new(self.workers, self.cancel.clone());
        let mut skipped = 0;

        tracing::info!("Starting harvest of {}", self.archive_url);

        // Discovery; the first listing page doubles as phase 1's page 1
        ctx.dedup.admit(&self.archive_url, PageKind::ListingPage);
        let (pagination, mut containers) = if self.cancel.is_cancelled() {
            tracing::info!("Discovery skipped: run cancelled");
            skipped += 1;
            (PageCount::unavailable(), Vec::new())
        } else {
            self.discover_from_first_page(&ctx).await
        };

        if pagination.is_degraded() {
            tracing::warn!(
                "Pagination discovery degraded: {}; listing pages may be missed",
                pagination
            );
        } else {
            tracing::info!("Discovered {}", pagination);
        }

        // Phase 1: remaining listing pages
        let listing_urls: Vec<String> =
            listing_page_urls(&self.archive_url, &self.page_url_template, pagination.pages)
                .into_iter()
                .filter(|url| ctx.dedup.admit(url, PageKind::ListingPage))
                .collect();
        self.announce(1, PageKind::ListingPage, listing_urls.len());
        let outcome = pool
            .run(listing_urls, {
                let ctx = Arc::clone(&ctx);
                move |url: String| {
                    let ctx = Arc::clone(&ctx);
                    async move { ctx.visit_listing_page(&url).await }
                }
            })
            .await;
        for links in ctx.settle(PageKind::ListingPage, outcome, &mut skipped) {
            containers.extend(links);
        }

        // Phase 2: containers
        self.announce(2, PageKind::Container, containers.len());
        let outcome = pool
            .run(containers, {
                let ctx = Arc::clone(&ctx);
                move |url: String| {
                    let ctx = Arc::clone(&ctx);
                    async move { ctx.visit_container(&url).await }
                }
            })
            .await;
        let leaves: Vec<String> = ctx
            .settle(PageKind::Container, outcome, &mut skipped)
            .into_iter()
            .flatten()
            .collect();

        // Phase 3: leaves
        self.announce(3, PageKind::Leaf, leaves.len());
        let outcome = pool
            .run(leaves, {
                let ctx = Arc::clone(&ctx);
                move |url: String| {
                    let ctx = Arc::clone(&ctx);
                    async move { ctx.visit_leaf(&url).await }
                }
            })
            .await;
        ctx.settle(PageKind::Leaf, outcome, &mut skipped);

        let cancelled = self.cancel.is_cancelled();
        let listing_pages = ctx.state.tally(PageKind::ListingPage);
        let container_tally = ctx.state.tally(PageKind::Container);
        let leaf_tally = ctx.state.tally(PageKind::Leaf);
        let harvest = ctx.state.finalize();

        if cancelled {
            tracing::warn!(
                "Harvest cancelled: {} task(s) skipped, returning partial results",
                skipped
            );
        }
        tracing::info!(
            "Harvest finished: {} record(s) from {}/{} leaves, {} diagnostic(s)",
            harvest.records.len(),
            leaf_tally.succeeded,
            leaf_tally.attempted(),
            harvest.diagnostics.len()
        );

        HarvestReport {
            records: harvest.records,
            diagnostics: harvest.diagnostics,
            pagination,
            listing_pages,
            containers: container_tally,
            leaves: leaf_tally,
            skipped,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Fetches page 1, reads the page count and its container links
    async fn discover_from_first_page(&self, ctx: &RunContext) -> (PageCount, Vec<String>) {
        let first = ctx
            .executor
            .fetch(&self.archive_url, PageKind::ListingPage)
            .await;
        match &first.status {
            FetchStatus::Success { body, .. } => {
                ctx.state.record_success(PageKind::ListingPage);
                let count = discover(body, &self.pagination);
                let containers = ctx.children_of(
                    body,
                    &self.archive_url,
                    &ctx.container_shape,
                    PageKind::ListingPage,
                    PageKind::Container,
                );
                (count, containers)
            }
            status => {
                ctx.record_failure(&first.task, status);
                (PageCount::unavailable(), Vec::new())
            }
        }
    }

    fn announce(&self, phase: u8, kind: PageKind, tasks: usize) {
        if self.cancel.is_cancelled() {
            tracing::info!("Phase {} ({}) skipped: run cancelled", phase, kind);
        } else {
            tracing::info!("Phase {}: fetching {} {} URL(s)", phase, tasks, kind);
        }
    }
}

/// Per-run state shared with every worker
struct RunContext {
    executor: Arc<RequestExecutor>,
    extractor: Arc<dyn RecordExtractor>,
    container_shape: LinkShape,
    leaf_shape: LinkShape,
    state: CrawlState,
    dedup: Deduplicator,
}

impl RunContext {
    async fn visit_listing_page(&self, url: &str) -> Vec<String> {
        self.visit_parent(url, &self.container_shape, PageKind::ListingPage, PageKind::Container)
            .await
    }

    async fn visit_container(&self, url: &str) -> Vec<String> {
        self.visit_parent(url, &self.leaf_shape, PageKind::Container, PageKind::Leaf)
            .await
    }

    /// Fetches a page and returns its newly admitted child URLs
    async fn visit_parent(
        &self,
        url: &str,
        shape: &LinkShape,
        kind: PageKind,
        child_kind: PageKind,
    ) -> Vec<String> {
        let result = self.executor.fetch(url, kind).await;
        match &result.status {
            FetchStatus::Success { body, .. } => {
                self.state.record_success(kind);
                self.children_of(body, url, shape, kind, child_kind)
            }
            status => {
                self.record_failure(&result.task, status);
                Vec::new()
            }
        }
    }

    fn children_of(
        &self,
        body: &str,
        page_url: &str,
        shape: &LinkShape,
        kind: PageKind,
        child_kind: PageKind,
    ) -> Vec<String> {
        let page_url = match Url::parse(page_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot resolve links on {}: {}", page_url, e);
                return Vec::new();
            }
        };

        let links = extract_links(body, &page_url, shape, kind);
        let found = links.len();
        let admitted: Vec<String> = links
            .into_iter()
            .filter(|link| self.dedup.admit(&link.url, child_kind))
            .map(|link| link.url)
            .collect();

        tracing::debug!(
            "{} {}: {} {} link(s), {} new",
            kind,
            page_url,
            found,
            child_kind,
            admitted.len()
        );
        admitted
    }

    /// Fetches a leaf and hands its body to the record extractor
    async fn visit_leaf(&self, url: &str) {
        let result = self.executor.fetch(url, PageKind::Leaf).await;
        let body = match &result.status {
            FetchStatus::Success { body, .. } => body,
            status => {
                self.record_failure(&result.task, status);
                return;
            }
        };

        let extracted = Url::parse(url)
            .map_err(|e| e.to_string())
            .and_then(|leaf_url| {
                self.extractor
                    .extract(body, &leaf_url)
                    .map_err(|e| e.to_string())
            });

        match extracted {
            Ok(mut records) => {
                tracing::debug!("Leaf {}: {} record(s)", url, records.len());
                // Records may only point at the leaf that was actually fetched
                for record in &mut records {
                    if record.source_url() != url {
                        tracing::warn!(
                            "Extractor set source {} on a record from {}; using the leaf URL",
                            record.source_url(),
                            url
                        );
                        record.set_source_url(url);
                    }
                }
                self.state.record_success(PageKind::Leaf);
                self.state.append_records(records);
            }
            Err(e) => self.state.record_diagnostic(Diagnostic::new(
                url,
                PageKind::Leaf,
                DiagnosticReason::Extraction(e),
            )),
        }
    }

    fn record_failure(&self, task: &FetchTask, status: &FetchStatus) {
        let reason = match status {
            FetchStatus::Success { .. } => return,
            FetchStatus::NotFound => DiagnosticReason::NotFound,
            FetchStatus::FatalError(FetchCause::Cancelled) => DiagnosticReason::Cancelled,
            FetchStatus::FatalError(cause) | FetchStatus::TransientError(cause) => {
                DiagnosticReason::RetriesExhausted {
                    attempts: task.attempt,
                    cause: cause.to_string(),
                }
            }
        };
        self.state
            .record_diagnostic(Diagnostic::new(task.url.clone(), task.kind, reason));
    }

    /// Collects a phase's results; worker panics become diagnostics
    fn settle<T>(
        &self,
        kind: PageKind,
        outcome: PhaseOutcome<String, T>,
        skipped: &mut usize,
    ) -> Vec<T> {
        *skipped += outcome.skipped.len();
        outcome
            .completed
            .into_iter()
            .filter_map(|completed| match completed.outcome {
                Ok(value) => Some(value),
                Err(panic) => {
                    self.state.record_diagnostic(Diagnostic::new(
                        completed.item,
                        kind,
                        DiagnosticReason::WorkerPanicked(panic),
                    ));
                    None
                }
            })
            .collect()
    }
}
