//! Tabular layout shared by every record writer

use crate::extract::Record;

pub(crate) const SOURCE_URL_COLUMN: &str = "source_url";

/// Records laid out as a header and rows of cells
///
/// Columns are the union of field names in first-seen order, then
/// `source_url`. Rows are sorted by source URL; records from the same leaf
/// keep their extraction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTable<'a> {
    pub header: Vec<String>,
    pub rows: Vec<Vec<&'a str>>,
}

impl<'a> RecordTable<'a> {
    pub fn new(records: &'a [Record], missing_value: &'a str) -> Self {
        let mut sorted: Vec<&Record> = records.iter().collect();
        sorted.sort_by(|a, b| a.source_url().cmp(b.source_url()));

        let columns = record_columns(sorted.iter().copied());
        let rows = sorted
            .iter()
            .map(|record| {
                let mut row: Vec<&str> = columns
                    .iter()
                    .map(|name| record.get(name).unwrap_or(missing_value))
                    .collect();
                row.push(record.source_url());
                row
            })
            .collect();

        let mut header = columns;
        header.push(SOURCE_URL_COLUMN.to_string());
        Self { header, rows }
    }
}

/// Union of field names across records, in first-seen order
pub fn record_columns<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for (name, _) in record.fields() {
            if name != SOURCE_URL_COLUMN && !columns.contains(name) {
                columns.push(name.clone());
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_layout() {
        let records = vec![
            Record::new("https://e.org/b")
                .with_field("title", Some("B"))
                .with_field("doi", Some("10.1/b")),
            Record::new("https://e.org/a")
                .with_field("title", Some("A"))
                .with_field("author", Some("Ana")),
            Record::new("https://e.org/a")
                .with_field("title", Some("A"))
                .with_field("author", Some("Rui")),
        ];

        let table = RecordTable::new(&records, "-");
        assert_eq!(table.header, vec!["title", "author", "doi", "source_url"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["A", "Ana", "-", "https://e.org/a"],
                vec!["A", "Rui", "-", "https://e.org/a"],
                vec!["B", "-", "10.1/b", "https://e.org/b"],
            ]
        );
    }

    #[test]
    fn test_source_url_field_is_not_duplicated() {
        let records = vec![Record::new("https://e.org/a").with_field("source_url", Some("x"))];
        let table = RecordTable::new(&records, "");
        assert_eq!(table.header, vec!["source_url"]);
        assert_eq!(table.rows, vec![vec!["https://e.org/a"]]);
    }
}
