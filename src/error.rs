//! Error types for u-bizlens.
//!
//! Data-dependent problems (unparseable cells, unusable filter bounds,
//! missing insight preconditions) never surface here; they degrade
//! silently inside the engines. Only structurally invalid calls and
//! ingestion failures produce an [`Error`].

/// All errors produced by u-bizlens operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// CSV ingestion failed.
    #[error("CSV parse error at line {line}: {message}")]
    CsvParse { line: usize, message: String },
    /// Column not found in the table.
    #[error("column '{name}' not found")]
    ColumnNotFound { name: String },
    /// A column with the same name already exists in the table.
    #[error("column '{name}' already exists")]
    DuplicateColumn { name: String },
    /// Column length does not match the table's row count.
    #[error("expected {expected} rows, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Column has a different kind than the operation requires.
    #[error("column '{column}' is {actual}, expected {expected}")]
    KindMismatch {
        column: String,
        expected: crate::table::ColumnKind,
        actual: crate::table::ColumnKind,
    },
    /// The session holds no dataset yet.
    #[error("no dataset loaded")]
    NoDataset,
    /// Configuration document could not be decoded.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// I/O error during file reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        let line = e
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();
        match e.into_kind() {
            csv::ErrorKind::Io(io) => Self::Io(io),
            kind => Self::CsvParse {
                line,
                message: csv_kind_message(&kind),
            },
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.message().to_string())
    }
}

fn csv_kind_message(kind: &csv::ErrorKind) -> String {
    match kind {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {expected_len} fields, got {len}"),
        csv::ErrorKind::Utf8 { err, .. } => format!("invalid UTF-8: {err}"),
        other => format!("{other:?}"),
    }
}
