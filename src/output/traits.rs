//! Output handler traits and types
//!
//! This module defines the trait interface for output handlers, which take
//! the records and diagnostics of a finished harvest and persist them.

use crate::extract::Record;
use crate::state::Diagnostic;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write spreadsheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for output handlers
///
/// Handlers receive the final, already collected results of a run; they
/// never see a harvest in progress.
pub trait OutputHandler {
    /// Writes all records and diagnostics
    ///
    /// # Returns
    ///
    /// The number of record rows and diagnostic rows written
    fn write(&self, records: &[Record], diagnostics: &[Diagnostic]) -> OutputResult<(usize, usize)>;
}
