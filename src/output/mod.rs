//! Output module for persisting harvest results
//!
//! This module handles:
//! - Writing records and diagnostics as delimiter-separated files
//! - Writing the same tables to an `.xlsx` workbook
//! - Summarizing a finished harvest for the operator

mod csv_output;
pub mod stats;
mod table;
mod traits;
mod xlsx_output;

pub use csv_output::{write_diagnostics, write_records, CsvOptions, CsvOutputHandler};
pub use stats::{print_statistics, HarvestStatistics};
pub use table::{record_columns, RecordTable};
pub use traits::{OutputError, OutputHandler, OutputResult};
pub use xlsx_output::XlsxOutputHandler;

use crate::crawler::HarvestReport;

/// Writes a report's records and diagnostics through an output handler
///
/// # Returns
///
/// * `Ok((records, diagnostics))` - Number of rows written to each output
/// * `Err(OutputError)` - Writing either output failed
pub fn write_report(
    handler: &dyn OutputHandler,
    report: &HarvestReport,
) -> OutputResult<(usize, usize)> {
    handler.write(&report.records, &report.diagnostics)
}
