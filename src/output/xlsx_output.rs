//! Spreadsheet output
//!
//! One workbook with a `records` sheet, laid out exactly like the
//! delimiter-separated records file, and a `diagnostics` sheet.

use crate::config::OutputConfig;
use crate::extract::Record;
use crate::output::csv_output::ensure_parent;
use crate::output::table::RecordTable;
use crate::output::traits::{OutputError, OutputHandler, OutputResult};
use crate::state::Diagnostic;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::{Path, PathBuf};

/// Writes records and diagnostics into an `.xlsx` workbook
#[derive(Debug, Clone)]
pub struct XlsxOutputHandler {
    path: PathBuf,
    missing_value: String,
}

impl XlsxOutputHandler {
    pub fn new(path: impl Into<PathBuf>, missing_value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            missing_value: missing_value.into(),
        }
    }

    /// Returns `None` when `spreadsheet-path` is empty
    pub fn from_config(config: &OutputConfig) -> Option<Self> {
        if config.spreadsheet_path.is_empty() {
            return None;
        }
        Some(Self::new(&config.spreadsheet_path, &config.missing_value))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputHandler for XlsxOutputHandler {
    fn write(&self, records: &[Record], diagnostics: &[Diagnostic]) -> OutputResult<(usize, usize)> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();

        let table = RecordTable::new(records, &self.missing_value);
        let sheet = workbook.add_worksheet();
        sheet.set_name("records")?;
        write_row(sheet, 0, &table.header, Some(&bold))?;
        for (i, row) in table.rows.iter().enumerate() {
            write_row(sheet, row_number(i + 1)?, row, None)?;
        }

        let sheet = workbook.add_worksheet();
        sheet.set_name("diagnostics")?;
        write_row(sheet, 0, &["url", "kind", "reason"], Some(&bold))?;
        for (i, diagnostic) in diagnostics.iter().enumerate() {
            let reason = diagnostic.reason.to_string();
            write_row(
                sheet,
                row_number(i + 1)?,
                &[diagnostic.url.as_str(), diagnostic.kind.as_str(), reason.as_str()],
                None,
            )?;
        }

        ensure_parent(&self.path)?;
        workbook.save(&self.path)?;
        tracing::info!(
            "Wrote {} record(s) and {} diagnostic(s) to {}",
            table.rows.len(),
            diagnostics.len(),
            self.path.display()
        );

        Ok((table.rows.len(), diagnostics.len()))
    }
}

fn row_number(index: usize) -> OutputResult<u32> {
    u32::try_from(index).map_err(|_| OutputError::Format(format!("row {} out of range", index)))
}

fn write_row<S: AsRef<str>>(
    sheet: &mut Worksheet,
    row: u32,
    cells: &[S],
    format: Option<&Format>,
) -> OutputResult<()> {
    for (col, cell) in cells.iter().enumerate() {
        let col = u16::try_from(col)
            .map_err(|_| OutputError::Format(format!("column {} out of range", col)))?;
        match format {
            Some(format) => sheet.write_string_with_format(row, col, cell.as_ref(), format)?,
            None => sheet.write_string(row, col, cell.as_ref())?,
        };
    }
    Ok(())
}
