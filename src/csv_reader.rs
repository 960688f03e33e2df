//! Raw CSV ingestion.
//!
//! Reads CSV text into a *raw* [`Table`]: every column is
//! [`Categorical`](crate::table::ColumnKind::Categorical) text and null
//! markers become Missing. No type inference happens here; hand the
//! result to [`infer`](crate::inference::infer).
//!
//! # Features
//!
//! - RFC 4180 quoting via the `csv` crate
//! - Standard null markers recognized: empty, `NA`, `N/A`, `null`, `NULL`, `None`, `NaN`, ...
//! - Configurable delimiter, header presence and null markers
//! - Blank or repeated header names are made unique (`col_3`, `Sales.1`)
//!
//! # Example
//!
//! ```
//! use u_bizlens::csv_reader::CsvReader;
//! use u_bizlens::table::ColumnKind;
//!
//! let csv = "Country,Sales\nUS,100\nFR,NA\n";
//! let raw = CsvReader::new().parse_str(csv).unwrap();
//! assert_eq!(raw.row_count(), 2);
//! assert_eq!(raw.column(1).unwrap().kind(), ColumnKind::Categorical);
//! assert_eq!(raw.column(1).unwrap().null_count(), 1);
//! ```

use std::collections::HashSet;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};

use crate::error::Result;
use crate::table::{Column, Table};

/// Standard null value markers recognized during reading.
const DEFAULT_NULL_MARKERS: &[&str] = &[
    "", "NA", "N/A", "na", "n/a", "null", "NULL", "None", "none", "NaN", "nan", "NAN", "#N/A",
    "#NA",
];

/// CSV reader configuration and entry point.
#[derive(Debug, Clone)]
pub struct CsvReader {
    delimiter: u8,
    has_header: bool,
    null_markers: HashSet<String>,
}

impl CsvReader {
    /// Creates a reader with default settings (comma delimiter, header row, standard null markers).
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            null_markers: DEFAULT_NULL_MARKERS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Sets the field delimiter (default: comma).
    pub fn delimiter(mut self, delim: u8) -> Self {
        self.delimiter = delim;
        self
    }

    /// Sets whether the first row is a header (default: true).
    pub fn has_header(mut self, header: bool) -> Self {
        self.has_header = header;
        self
    }

    /// Sets custom null markers (replaces defaults).
    pub fn null_markers(mut self, markers: Vec<String>) -> Self {
        self.null_markers = markers.into_iter().collect();
        self
    }

    /// Reads CSV text into a raw table.
    pub fn parse_str(&self, input: &str) -> Result<Table> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .trim(Trim::Fields)
            .from_reader(input.as_bytes());

        let mut records = reader.records();
        let headers: Vec<String> = if self.has_header {
            match records.next() {
                Some(record) => record?.iter().map(str::to_string).collect(),
                None => return Ok(Table::new()),
            }
        } else {
            Vec::new()
        };

        let mut raw_columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for record in records {
            let record = record?;
            if raw_columns.is_empty() {
                raw_columns = vec![Vec::new(); record.len()];
            }
            for (col_idx, field) in record.iter().enumerate() {
                let cell = (!self.null_markers.contains(field)).then(|| field.to_string());
                raw_columns[col_idx].push(cell);
            }
        }

        let names = unique_names(&headers, raw_columns.len());
        let mut table = Table::new();
        for (name, cells) in names.into_iter().zip(raw_columns) {
            table.add_column(name, Column::categorical_from(cells))?;
        }
        debug!(
            rows = table.row_count(),
            columns = table.column_count(),
            "read raw CSV table"
        );
        Ok(table)
    }

    /// Reads a CSV file from disk into a raw table.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Table> {
        let content = std::fs::read_to_string(path)?;
        self.parse_str(&content)
    }
}

impl Default for CsvReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Produces `n` unique column names from the header row.
fn unique_names(headers: &[String], n: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(n);
    for i in 0..n {
        let base = match headers.get(i).map(|h| h.trim()) {
            Some(h) if !h.is_empty() => h.to_string(),
            Some(_) => {
                warn!(index = i, "blank CSV header, using generated name");
                format!("col_{i}")
            }
            None => format!("col_{i}"),
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        if name != base {
            warn!(column = %base, renamed = %name, "duplicate CSV header");
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::table::ColumnKind;

    #[test]
    fn read_simple_csv() {
        let t = CsvReader::new()
            .parse_str("a,b\n1,x\n2,y\n")
            .unwrap();
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.column_names(), &["a", "b"]);
        // no inference at this stage
        assert!(t.iter().all(|(_, c)| c.kind() == ColumnKind::Categorical));
        assert_eq!(t.column(0).unwrap().text_at(1), Some("2"));
    }

    #[test]
    fn null_markers_become_missing() {
        let t = CsvReader::new()
            .parse_str("x\n1\nNA\n\"\"\nnull\n#N/A\n5\n")
            .unwrap();
        let col = t.column(0).unwrap();
        assert_eq!(col.len(), 6);
        assert_eq!(col.null_count(), 4);
    }

    #[test]
    fn custom_null_markers() {
        let t = CsvReader::new()
            .null_markers(vec!["-".into()])
            .parse_str("x\n-\nNA\n")
            .unwrap();
        let col = t.column(0).unwrap();
        assert_eq!(col.text_at(0), None);
        assert_eq!(col.text_at(1), Some("NA"));
    }

    #[test]
    fn quoted_fields_and_crlf() {
        let t = CsvReader::new()
            .parse_str("name,note\r\n\"Smith, J\",\"said \"\"hi\"\"\"\r\n")
            .unwrap();
        assert_eq!(t.column(0).unwrap().text_at(0), Some("Smith, J"));
        assert_eq!(t.column(1).unwrap().text_at(0), Some("said \"hi\""));
    }

    #[test]
    fn bom_and_whitespace_trimmed() {
        let t = CsvReader::new().parse_str("\u{feff}v\n  42 \n").unwrap();
        assert_eq!(t.column_names(), &["v"]);
        assert_eq!(t.column(0).unwrap().text_at(0), Some("42"));
    }

    #[test]
    fn empty_and_header_only() {
        let t = CsvReader::new().parse_str("").unwrap();
        assert!(t.is_empty());

        let t = CsvReader::new().parse_str("a,b\n").unwrap();
        assert_eq!(t.column_count(), 2);
        assert_eq!(t.row_count(), 0);
    }

    #[test]
    fn ragged_rows_are_an_error() {
        let err = CsvReader::new().parse_str("a,b\n1,2\n3\n").unwrap_err();
        assert!(matches!(err, Error::CsvParse { .. }));
    }

    #[test]
    fn without_header() {
        let t = CsvReader::new()
            .has_header(false)
            .parse_str("1,2\n3,4\n")
            .unwrap();
        assert_eq!(t.column_names(), &["col_0", "col_1"]);
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn semicolon_delimiter() {
        let t = CsvReader::new()
            .delimiter(b';')
            .parse_str("a;b\n1;2\n")
            .unwrap();
        assert_eq!(t.column_count(), 2);
    }

    #[test]
    fn duplicate_and_blank_headers() {
        let t = CsvReader::new()
            .parse_str("Sales,Sales,\n1,2,3\n")
            .unwrap();
        assert_eq!(t.column_names(), &["Sales", "Sales.1", "col_2"]);
    }

    #[test]
    fn parse_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        std::fs::write(&path, "id,qty\n1,5\n2,7\n").unwrap();
        let t = CsvReader::new().parse_file(&path).unwrap();
        assert_eq!(t.row_count(), 2);

        let err = CsvReader::new()
            .parse_file(dir.path().join("absent.csv"))
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
