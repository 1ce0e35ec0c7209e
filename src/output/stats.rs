//! Statistics for a finished harvest
//!
//! This module condenses a [`HarvestReport`] into the numbers an operator
//! needs to judge completeness, and prints them.

use crate::crawler::HarvestReport;
use crate::output::table::record_columns;
use crate::state::{DiagnosticReason, PageKind, TallySnapshot};
use std::collections::BTreeMap;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Counters per page kind, in hierarchy order
    pub tallies: Vec<(PageKind, TallySnapshot)>,

    /// Human-readable pagination outcome
    pub pagination: String,

    /// Whether the listing page count was a guess
    pub discovery_degraded: bool,

    /// Total records produced
    pub total_records: usize,

    /// Distinct leaves that produced records
    pub unique_sources: usize,

    /// Records with a value, per field, in column order
    pub field_coverage: Vec<(String, usize)>,

    /// Diagnostic count per reason category
    pub diagnostics_by_reason: BTreeMap<&'static str, usize>,

    /// Tasks never started due to cancellation
    pub skipped: usize,

    pub cancelled: bool,
    pub duration_seconds: i64,
}

impl HarvestStatistics {
    pub fn from_report(report: &HarvestReport) -> Self {
        let mut diagnostics_by_reason = BTreeMap::new();
        for diagnostic in &report.diagnostics {
            *diagnostics_by_reason
                .entry(reason_category(&diagnostic.reason))
                .or_insert(0) += 1;
        }

        Self {
            tallies: PageKind::all()
                .into_iter()
                .map(|kind| (kind, report.tally(kind)))
                .collect(),
            pagination: report.pagination.to_string(),
            discovery_degraded: report.discovery_degraded(),
            total_records: report.records.len(),
            unique_sources: report.unique_sources(),
            field_coverage: field_coverage(report),
            diagnostics_by_reason,
            skipped: report.skipped,
            cancelled: report.cancelled,
            duration_seconds: report.duration().num_seconds(),
        }
    }

    /// Leaf success rate as a percentage
    pub fn leaf_success_rate(&self) -> f64 {
        let leaves = self
            .tallies
            .iter()
            .find(|(kind, _)| *kind == PageKind::Leaf)
            .map(|(_, tally)| *tally)
            .unwrap_or_default();
        if leaves.attempted() == 0 {
            return 0.0;
        }
        (leaves.succeeded as f64 / leaves.attempted() as f64) * 100.0
    }
}

fn field_coverage(report: &HarvestReport) -> Vec<(String, usize)> {
    record_columns(&report.records)
        .into_iter()
        .map(|name| {
            let filled = report
                .records
                .iter()
                .filter(|record| record.get(&name).is_some())
                .count();
            (name, filled)
        })
        .collect()
}

fn reason_category(reason: &DiagnosticReason) -> &'static str {
    match reason {
        DiagnosticReason::NotFound => "not found",
        DiagnosticReason::RetriesExhausted { .. } => "retries exhausted",
        DiagnosticReason::Cancelled => "cancelled",
        DiagnosticReason::Extraction(_) => "extraction failed",
        DiagnosticReason::WorkerPanicked(_) => "worker panicked",
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Pagination: {}", stats.pagination);
    if stats.discovery_degraded {
        println!("  WARNING: page count was not read from the listing; pages may be missing");
    }
    println!();

    println!("Pages by Kind:");
    for (kind, tally) in &stats.tallies {
        println!(
            "  {}: {}/{} succeeded ({} not found, {} failed)",
            kind,
            tally.succeeded,
            tally.attempted(),
            tally.not_found,
            tally.failed
        );
    }
    println!();

    println!("Records: {}", stats.total_records);
    println!("  Unique source URLs: {}", stats.unique_sources);
    println!();

    if !stats.field_coverage.is_empty() {
        println!("Field Coverage:");
        for (field, filled) in &stats.field_coverage {
            println!("  {}: {}/{}", field, filled, stats.total_records);
        }
        println!();
    }

    if !stats.diagnostics_by_reason.is_empty() {
        println!("Diagnostics:");
        let mut counts: Vec<_> = stats.diagnostics_by_reason.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));
        for (reason, count) in counts {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    if stats.cancelled {
        println!(
            "Run was CANCELLED: {} task(s) never started; results are partial",
            stats.skipped
        );
    }

    println!(
        "Leaf Success Rate: {:.1}% in {}s",
        stats.leaf_success_rate(),
        stats.duration_seconds
    );
}
