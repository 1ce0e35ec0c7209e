//! Delimiter-separated output for records and diagnostics
//!
//! Record files get one column per field name seen across all records, in
//! first-seen order, followed by `source_url`. Rows are sorted by source URL
//! since the harvest itself returns records in completion order.

use crate::config::OutputConfig;
use crate::extract::Record;
use crate::output::table::RecordTable;
use crate::output::traits::{OutputError, OutputHandler, OutputResult};
use crate::state::Diagnostic;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Formatting shared by both writers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub missing_value: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b'|',
            missing_value: String::new(),
        }
    }
}

impl CsvOptions {
    pub fn from_config(config: &OutputConfig) -> OutputResult<Self> {
        let delimiter = match config.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => *byte,
            _ => {
                return Err(OutputError::Format(format!(
                    "delimiter must be one ASCII character, got {:?}",
                    config.delimiter
                )))
            }
        };
        Ok(Self {
            delimiter,
            missing_value: config.missing_value.clone(),
        })
    }

    fn writer<W: Write>(&self, out: W) -> csv::Writer<W> {
        csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(out)
    }
}

/// Writes records sorted by source URL, with a header row
pub fn write_records<W: Write>(
    out: W,
    records: &[Record],
    options: &CsvOptions,
) -> OutputResult<usize> {
    let table = RecordTable::new(records, &options.missing_value);
    let mut writer = options.writer(out);

    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }

    writer.flush()?;
    Ok(table.rows.len())
}

/// Writes diagnostics as `url, kind, reason` rows
pub fn write_diagnostics<W: Write>(
    out: W,
    diagnostics: &[Diagnostic],
    options: &CsvOptions,
) -> OutputResult<usize> {
    let mut writer = options.writer(out);
    writer.write_record(["url", "kind", "reason"])?;

    for diagnostic in diagnostics {
        writer.write_record([
            diagnostic.url.as_str(),
            diagnostic.kind.as_str(),
            diagnostic.reason.to_string().as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(diagnostics.len())
}

/// File-backed CSV output handler
#[derive(Debug, Clone)]
pub struct CsvOutputHandler {
    records_path: PathBuf,
    diagnostics_path: PathBuf,
    options: CsvOptions,
}

impl CsvOutputHandler {
    pub fn new(
        records_path: impl Into<PathBuf>,
        diagnostics_path: impl Into<PathBuf>,
        options: CsvOptions,
    ) -> Self {
        Self {
            records_path: records_path.into(),
            diagnostics_path: diagnostics_path.into(),
            options,
        }
    }

    pub fn from_config(config: &OutputConfig) -> OutputResult<Self> {
        Ok(Self::new(
            &config.records_path,
            &config.diagnostics_path,
            CsvOptions::from_config(config)?,
        ))
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    pub fn diagnostics_path(&self) -> &Path {
        &self.diagnostics_path
    }
}

impl OutputHandler for CsvOutputHandler {
    fn write(&self, records: &[Record], diagnostics: &[Diagnostic]) -> OutputResult<(usize, usize)> {
        let written = write_records(create(&self.records_path)?, records, &self.options)?;
        tracing::info!(
            "Wrote {} record(s) to {}",
            written,
            self.records_path.display()
        );

        let noted =
            write_diagnostics(create(&self.diagnostics_path)?, diagnostics, &self.options)?;
        tracing::info!(
            "Wrote {} diagnostic(s) to {}",
            noted,
            self.diagnostics_path.display()
        );
        Ok((written, noted))
    }
}

/// Creates the file and any missing parent directories
fn create(path: &Path) -> OutputResult<File> {
    ensure_parent(path)?;
    Ok(File::create(path)?)
}

pub(crate) fn ensure_parent(path: &Path) -> OutputResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DiagnosticReason, PageKind};
    use tempfile::TempDir;

    fn to_string(f: impl FnOnce(&mut Vec<u8>) -> OutputResult<usize>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_records_sorted_with_union_header() {
        let records = vec![
            Record::new("https://e.org/b")
                .with_field("title", Some("B"))
                .with_field("doi", Some("10.1/b")),
            Record::new("https://e.org/a")
                .with_field("title", Some("A"))
                .with_field("author", Some("Ana")),
        ];

        let out = to_string(|buf| write_records(buf, &records, &CsvOptions::default()));
        assert_eq!(
            out,
            "title|author|doi|source_url\n\
             A|Ana||https://e.org/a\n\
             B||10.1/b|https://e.org/b\n"
        );
    }

    #[test]
    fn test_missing_value_and_delimiter() {
        let records = vec![Record::new("https://e.org/a")
            .with_field("title", Some("A"))
            .with_field("doi", None::<String>)];
        let options = CsvOptions {
            delimiter: b';',
            missing_value: "NA".to_string(),
        };

        let out = to_string(|buf| write_records(buf, &records, &options));
        assert_eq!(out, "title;doi;source_url\nA;NA;https://e.org/a\n");
    }

    #[test]
    fn test_values_containing_delimiter_are_quoted() {
        let records = vec![Record::new("https://e.org/a").with_field("title", Some("A | B"))];
        let out = to_string(|buf| write_records(buf, &records, &CsvOptions::default()));
        assert!(out.contains("\"A | B\""));
    }

    #[test]
    fn test_empty_records_still_have_header() {
        let out = to_string(|buf| write_records(buf, &[], &CsvOptions::default()));
        assert_eq!(out, "source_url\n");
    }

    #[test]
    fn test_diagnostics_rows() {
        let diagnostics = vec![
            Diagnostic::new("https://e.org/x", PageKind::Leaf, DiagnosticReason::NotFound),
            Diagnostic::new(
                "https://e.org/y",
                PageKind::Container,
                DiagnosticReason::RetriesExhausted {
                    attempts: 3,
                    cause: "HTTP 503".to_string(),
                },
            ),
        ];

        let out = to_string(|buf| write_diagnostics(buf, &diagnostics, &CsvOptions::default()));
        assert_eq!(
            out,
            "url|kind|reason\n\
             https://e.org/x|leaf|not found (HTTP 404)\n\
             https://e.org/y|container|failed after 3 attempt(s): HTTP 503\n"
        );
    }

    #[test]
    fn test_options_from_config() {
        let mut config = OutputConfig::default();
        config.delimiter = "\t".to_string();
        assert_eq!(CsvOptions::from_config(&config).unwrap().delimiter, b'\t');

        config.delimiter = "||".to_string();
        assert!(matches!(
            CsvOptions::from_config(&config),
            Err(OutputError::Format(_))
        ));
    }

    #[test]
    fn test_handler_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let handler = CsvOutputHandler::new(
            dir.path().join("out/records.csv"),
            dir.path().join("out/diagnostics.csv"),
            CsvOptions::default(),
        );

        let records = vec![Record::new("https://e.org/a").with_field("title", Some("A"))];
        assert_eq!(handler.write(&records, &[]).unwrap(), (1, 0));

        let written = std::fs::read_to_string(handler.records_path()).unwrap();
        assert_eq!(written, "title|source_url\nA|https://e.org/a\n");
        let written = std::fs::read_to_string(handler.diagnostics_path()).unwrap();
        assert_eq!(written, "url|kind|reason\n");
    }
}
