use crate::extract::Record;
use crate::state::PageKind;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Why a task did not yield a success
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticReason {
    /// The server answered 404
    NotFound,

    /// Every attempt failed transiently
    RetriesExhausted { attempts: u32, cause: String },

    /// The run was cancelled while this task was waiting to retry
    Cancelled,

    /// The record extractor rejected a fetched leaf
    Extraction(String),

    /// The worker handling this task panicked
    WorkerPanicked(String),
}

impl DiagnosticReason {
    /// Returns true for the 404 outcome; everything else counts as a fatal failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl fmt::Display for DiagnosticReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found (HTTP 404)"),
            Self::RetriesExhausted { attempts, cause } => {
                write!(f, "failed after {} attempt(s): {}", attempts, cause)
            }
            Self::Cancelled => write!(f, "cancelled before retry"),
            Self::Extraction(msg) => write!(f, "extraction failed: {}", msg),
            Self::WorkerPanicked(msg) => write!(f, "worker panicked: {}", msg),
        }
    }
}

/// Terminal failure report for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub url: String,
    pub kind: PageKind,
    pub reason: DiagnosticReason,
}

impl Diagnostic {
    pub fn new(url: impl Into<String>, kind: PageKind, reason: DiagnosticReason) -> Self {
        Self {
            url: url.into(),
            kind,
            reason,
        }
    }
}

/// Per-kind outcome counters
#[derive(Debug, Default)]
struct KindTally {
    succeeded: AtomicUsize,
    not_found: AtomicUsize,
    failed: AtomicUsize,
}

/// Point-in-time copy of one kind's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallySnapshot {
    pub succeeded: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl TallySnapshot {
    /// Number of tasks of this kind that reached a terminal state
    pub fn attempted(&self) -> usize {
        self.succeeded + self.not_found + self.failed
    }
}

/// Shared accumulator for one harvest
///
/// Workers only touch it through these methods; the collected records and
/// diagnostics leave it once, through [`CrawlState::finalize`].
#[derive(Debug, Default)]
pub struct CrawlState {
    tallies: [KindTally; 3],
    records: Mutex<Vec<Record>>,
    diagnostics: Mutex<Vec<Diagnostic>>,
    frozen: AtomicBool,
}

/// Final readout of a [`CrawlState`]
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    pub records: Vec<Record>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a successful task of the given kind
    pub fn record_success(&self, kind: PageKind) {
        self.tallies[kind.index()]
            .succeeded
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Appends the records extracted from one leaf
    pub fn append_records(&self, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        if self.frozen.load(Ordering::Acquire) {
            tracing::warn!("Dropping {} record(s) delivered after finalize", records.len());
            return;
        }
        lock(&self.records).extend(records);
    }

    /// Records a terminal failure and counts it against its kind
    pub fn record_diagnostic(&self, diagnostic: Diagnostic) {
        let tally = &self.tallies[diagnostic.kind.index()];
        if diagnostic.reason.is_not_found() {
            tally.not_found.fetch_add(1, Ordering::Relaxed);
        } else {
            tally.failed.fetch_add(1, Ordering::Relaxed);
        }

        tracing::warn!(
            "{} {} failed: {}",
            diagnostic.kind,
            diagnostic.url,
            diagnostic.reason
        );

        if self.frozen.load(Ordering::Acquire) {
            return;
        }
        lock(&self.diagnostics).push(diagnostic);
    }

    /// Returns the counters for one kind
    pub fn tally(&self, kind: PageKind) -> TallySnapshot {
        let tally = &self.tallies[kind.index()];
        TallySnapshot {
            succeeded: tally.succeeded.load(Ordering::Relaxed),
            not_found: tally.not_found.load(Ordering::Relaxed),
            failed: tally.failed.load(Ordering::Relaxed),
        }
    }

    /// Number of records collected so far
    pub fn record_count(&self) -> usize {
        lock(&self.records).len()
    }

    /// Freezes the state and hands out everything collected
    ///
    /// Later calls return an empty [`Harvest`].
    pub fn finalize(&self) -> Harvest {
        self.frozen.store(true, Ordering::Release);
        Harvest {
            records: std::mem::take(&mut *lock(&self.records)),
            diagnostics: std::mem::take(&mut *lock(&self.diagnostics)),
        }
    }
}

/// A panicking worker cannot leave a half-pushed Vec behind, so a poisoned
/// lock still guards consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(url: &str) -> Record {
        Record::new(url).with_field("title", Some("T"))
    }

    #[test]
    fn test_tallies_by_kind() {
        let state = CrawlState::new();
        state.record_success(PageKind::Leaf);
        state.record_success(PageKind::Leaf);
        state.record_success(PageKind::Container);
        state.record_diagnostic(Diagnostic::new(
            "https://e.org/a",
            PageKind::Leaf,
            DiagnosticReason::NotFound,
        ));
        state.record_diagnostic(Diagnostic::new(
            "https://e.org/b",
            PageKind::Leaf,
            DiagnosticReason::Extraction("no title".to_string()),
        ));

        let leaves = state.tally(PageKind::Leaf);
        assert_eq!(leaves.succeeded, 2);
        assert_eq!(leaves.not_found, 1);
        assert_eq!(leaves.failed, 1);
        assert_eq!(leaves.attempted(), 4);
        assert_eq!(state.tally(PageKind::Container).succeeded, 1);
        assert_eq!(state.tally(PageKind::ListingPage).attempted(), 0);
    }

    #[test]
    fn test_finalize_hands_out_everything_once() {
        let state = CrawlState::new();
        state.append_records(vec![record("https://e.org/1"), record("https://e.org/1")]);
        state.record_diagnostic(Diagnostic::new(
            "https://e.org/2",
            PageKind::Leaf,
            DiagnosticReason::Cancelled,
        ));

        let harvest = state.finalize();
        assert_eq!(harvest.records.len(), 2);
        assert_eq!(harvest.diagnostics.len(), 1);

        let again = state.finalize();
        assert!(again.records.is_empty());
        assert!(again.diagnostics.is_empty());
    }

    #[test]
    fn test_no_mutation_after_finalize() {
        let state = CrawlState::new();
        let _ = state.finalize();
        state.append_records(vec![record("https://e.org/late")]);
        assert_eq!(state.record_count(), 0);
    }

    #[test]
    fn test_concurrent_appends() {
        let state = Arc::new(CrawlState::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        state.append_records(vec![record(&format!("https://e.org/{}/{}", i, j))]);
                        state.record_success(PageKind::Leaf);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(state.record_count(), 400);
        assert_eq!(state.tally(PageKind::Leaf).succeeded, 400);
    }

    #[test]
    fn test_reason_display() {
        let reason = DiagnosticReason::RetriesExhausted {
            attempts: 3,
            cause: "HTTP 503".to_string(),
        };
        assert_eq!(reason.to_string(), "failed after 3 attempt(s): HTTP 503");
        assert_eq!(DiagnosticReason::NotFound.to_string(), "not found (HTTP 404)");
    }
}
