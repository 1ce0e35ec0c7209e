//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `TaskState`: the per-URL fetch state machine
//! - `PageKind`: which level of the hierarchy a URL belongs to
//! - `CrawlState`: shared tallies, records and diagnostics for one run

mod crawl_state;
mod task_state;

// Re-export main types
pub use crawl_state::{CrawlState, Diagnostic, DiagnosticReason, Harvest, TallySnapshot};
pub use task_state::{PageKind, TaskState};
