//! Column-major table for tabular business data.
//!
//! A [`Table`] stores named columns of equal length. Every column carries
//! a closed [`ColumnKind`] tag decided once by the type inferencer, and a
//! compact [`ValidityBitmap`] marking which cells are Missing.
//!
//! # Column Kinds
//!
//! | Kind | Storage | Use case |
//! |------|---------|----------|
//! | [`Numeric`](Column::Numeric) | `Vec<f64>` + bitmap | Quantities, prices, counts |
//! | [`Datetime`](Column::Datetime) | `Vec<NaiveDateTime>` + bitmap | Order dates, timestamps |
//! | [`Categorical`](Column::Categorical) | `Vec<String>` + bitmap | Labels and raw text |
//!
//! Tables are never mutated by the engines: filtering, inference and
//! previews all return a new [`Table`].
//!
//! # Example
//!
//! ```
//! use u_bizlens::table::{Column, ColumnKind, Table};
//!
//! let table = Table::from_columns(vec![
//!     ("Country".to_string(), Column::categorical_from(vec![Some("US"), Some("FR")])),
//!     ("Sales".to_string(), Column::numeric_from(vec![Some(100.0), None])),
//! ])
//! .unwrap();
//!
//! assert_eq!(table.row_count(), 2);
//! assert_eq!(table.column_by_name("Sales").unwrap().kind(), ColumnKind::Numeric);
//! assert_eq!(table.total_null_count(), 1);
//! ```

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ── ValidityBitmap ────────────────────────────────────────────────────

/// Bit-packed validity bitmap using `Vec<u64>`.
///
/// Each bit indicates whether the corresponding row holds a value (1) or
/// is Missing (0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityBitmap {
    bits: Vec<u64>,
    len: usize,
}

impl ValidityBitmap {
    /// Creates an empty bitmap with no rows.
    pub fn empty() -> Self {
        Self {
            bits: Vec::new(),
            len: 0,
        }
    }

    /// Builds a bitmap from per-row presence flags.
    pub fn from_flags<I: IntoIterator<Item = bool>>(flags: I) -> Self {
        let mut bitmap = Self::empty();
        for valid in flags {
            bitmap.push(valid);
        }
        bitmap
    }

    /// Returns `true` if the value at `idx` is present.
    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len, "index {idx} out of bounds (len={})", self.len);
        let (word, bit) = (idx / 64, idx % 64);
        (self.bits[word] >> bit) & 1 == 1
    }

    /// Appends a new position.
    pub fn push(&mut self, valid: bool) {
        let idx = self.len;
        self.len += 1;
        let word = idx / 64;
        if word >= self.bits.len() {
            self.bits.push(0);
        }
        if valid {
            self.bits[word] |= 1u64 << (idx % 64);
        }
    }

    /// Returns the total number of tracked positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the bitmap tracks zero positions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Counts the Missing positions.
    pub fn null_count(&self) -> usize {
        self.len - self.valid_count()
    }

    /// Counts the present positions.
    pub fn valid_count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns an iterator over indices of present positions.
    pub fn valid_indices(&self) -> ValidIndicesIter<'_> {
        ValidIndicesIter {
            bitmap: self,
            current: 0,
        }
    }

    /// Gathers the flags at `rows` into a new bitmap.
    fn take(&self, rows: &[usize]) -> Self {
        Self::from_flags(rows.iter().map(|&r| self.is_valid(r)))
    }
}

/// Iterator over valid indices in a [`ValidityBitmap`].
pub struct ValidIndicesIter<'a> {
    bitmap: &'a ValidityBitmap,
    current: usize,
}

impl Iterator for ValidIndicesIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.current < self.bitmap.len {
            let idx = self.current;
            self.current += 1;
            if self.bitmap.is_valid(idx) {
                return Some(idx);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.bitmap.len - self.current))
    }
}

// ── ColumnKind ────────────────────────────────────────────────────────

/// Closed classification of a column's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Finite numbers stored as `f64`.
    Numeric,
    /// Calendar timestamps without time zone.
    Datetime,
    /// Strings: labels, identifiers and raw, not-yet-inferred text.
    Categorical,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "Numeric"),
            Self::Datetime => write!(f, "Datetime"),
            Self::Categorical => write!(f, "Categorical"),
        }
    }
}

// ── Column ────────────────────────────────────────────────────────────

/// A typed column with a validity bitmap for Missing cells.
///
/// Missing positions hold a placeholder (0.0, the Unix epoch, or an
/// empty string) that must be ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Dense `f64` values. Missing positions hold `0.0`.
    Numeric {
        values: Vec<f64>,
        validity: ValidityBitmap,
    },
    /// Timestamps. Missing positions hold the Unix epoch.
    Datetime {
        values: Vec<NaiveDateTime>,
        validity: ValidityBitmap,
    },
    /// Strings. Missing positions hold an empty string.
    Categorical {
        values: Vec<String>,
        validity: ValidityBitmap,
    },
}

impl Column {
    /// Creates a numeric column from optional cells (`None` = Missing).
    ///
    /// Non-finite cells (`NaN`, `±inf`) are stored as Missing.
    pub fn numeric_from<I: IntoIterator<Item = Option<f64>>>(cells: I) -> Self {
        let cells = cells.into_iter().map(|c| c.filter(|v| v.is_finite()));
        let (values, validity) = split_cells(cells, 0.0);
        Self::Numeric { values, validity }
    }

    /// Creates a datetime column from optional cells (`None` = Missing).
    pub fn datetime_from<I: IntoIterator<Item = Option<NaiveDateTime>>>(cells: I) -> Self {
        let (values, validity) = split_cells(cells, NaiveDateTime::default());
        Self::Datetime { values, validity }
    }

    /// Creates a categorical column from optional cells (`None` = Missing).
    pub fn categorical_from<S, I>(cells: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Option<S>>,
    {
        let (values, validity) =
            split_cells(cells.into_iter().map(|c| c.map(Into::into)), String::new());
        Self::Categorical { values, validity }
    }

    /// Returns the kind tag of this column.
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Numeric { .. } => ColumnKind::Numeric,
            Self::Datetime { .. } => ColumnKind::Datetime,
            Self::Categorical { .. } => ColumnKind::Categorical,
        }
    }

    /// Returns the number of rows in this column.
    pub fn len(&self) -> usize {
        self.validity().len()
    }

    /// Returns `true` if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a reference to the validity bitmap.
    pub fn validity(&self) -> &ValidityBitmap {
        match self {
            Self::Numeric { validity, .. }
            | Self::Datetime { validity, .. }
            | Self::Categorical { validity, .. } => validity,
        }
    }

    /// Returns the number of Missing cells.
    pub fn null_count(&self) -> usize {
        self.validity().null_count()
    }

    /// Returns the number of present cells.
    pub fn valid_count(&self) -> usize {
        self.validity().valid_count()
    }

    /// Returns `true` if the cell at `idx` is present.
    pub fn is_valid(&self, idx: usize) -> bool {
        self.validity().is_valid(idx)
    }

    /// Returns the number at `idx`, or `None` if Missing or not numeric.
    pub fn numeric_at(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Numeric { values, validity } if validity.is_valid(idx) => Some(values[idx]),
            _ => None,
        }
    }

    /// Returns the timestamp at `idx`, or `None` if Missing or not a datetime.
    pub fn datetime_at(&self, idx: usize) -> Option<NaiveDateTime> {
        match self {
            Self::Datetime { values, validity } if validity.is_valid(idx) => Some(values[idx]),
            _ => None,
        }
    }

    /// Returns the string at `idx`, or `None` if Missing or not categorical.
    pub fn text_at(&self, idx: usize) -> Option<&str> {
        match self {
            Self::Categorical { values, validity } if validity.is_valid(idx) => {
                Some(values[idx].as_str())
            }
            _ => None,
        }
    }

    /// Returns present numeric values (Missing excluded) as a new `Vec<f64>`.
    pub fn valid_numeric_values(&self) -> Option<Vec<f64>> {
        match self {
            Self::Numeric { values, validity } => {
                Some(validity.valid_indices().map(|i| values[i]).collect())
            }
            _ => None,
        }
    }

    /// Returns the string representation of the cell at `idx`.
    ///
    /// This is the representation categorical filters compare against and
    /// the key under which the cell is grouped.
    pub fn display_at(&self, idx: usize) -> Option<String> {
        if !self.is_valid(idx) {
            return None;
        }
        Some(match self {
            Self::Numeric { values, .. } => render_number(values[idx]),
            Self::Datetime { values, .. } => render_datetime(values[idx]),
            Self::Categorical { values, .. } => values[idx].clone(),
        })
    }

    /// Number of distinct present values.
    pub fn distinct_count(&self) -> usize {
        use std::collections::HashSet;
        match self {
            Self::Numeric { values, validity } => validity
                .valid_indices()
                .map(|i| values[i].to_bits())
                .collect::<HashSet<_>>()
                .len(),
            Self::Datetime { values, validity } => validity
                .valid_indices()
                .map(|i| values[i])
                .collect::<HashSet<_>>()
                .len(),
            Self::Categorical { values, validity } => validity
                .valid_indices()
                .map(|i| values[i].as_str())
                .collect::<HashSet<_>>()
                .len(),
        }
    }

    /// Gathers the cells at `rows` (in that order) into a new column.
    pub fn take(&self, rows: &[usize]) -> Self {
        match self {
            Self::Numeric { values, validity } => Self::Numeric {
                values: rows.iter().map(|&r| values[r]).collect(),
                validity: validity.take(rows),
            },
            Self::Datetime { values, validity } => Self::Datetime {
                values: rows.iter().map(|&r| values[r]).collect(),
                validity: validity.take(rows),
            },
            Self::Categorical { values, validity } => Self::Categorical {
                values: rows.iter().map(|&r| values[r].clone()).collect(),
                validity: validity.take(rows),
            },
        }
    }

    /// Approximate heap footprint in bytes (values plus bitmap).
    pub fn memory_bytes(&self) -> usize {
        let bitmap = self.len().div_ceil(64) * 8;
        let values = match self {
            Self::Numeric { values, .. } => values.len() * std::mem::size_of::<f64>(),
            Self::Datetime { values, .. } => values.len() * std::mem::size_of::<NaiveDateTime>(),
            // String header plus its bytes
            Self::Categorical { values, .. } => values
                .iter()
                .map(|s| s.len() + std::mem::size_of::<String>())
                .sum(),
        };
        values + bitmap
    }
}

fn split_cells<T: Clone, I: IntoIterator<Item = Option<T>>>(
    cells: I,
    placeholder: T,
) -> (Vec<T>, ValidityBitmap) {
    let mut values = Vec::new();
    let mut validity = ValidityBitmap::empty();
    for cell in cells {
        validity.push(cell.is_some());
        values.push(cell.unwrap_or_else(|| placeholder.clone()));
    }
    (values, validity)
}

/// Renders a number the way a spreadsheet shows it: integral values
/// without a fractional part.
pub(crate) fn render_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

/// Renders a timestamp as a date when it falls on midnight.
pub(crate) fn render_datetime(dt: NaiveDateTime) -> String {
    if dt.time() == NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

// ── Table ─────────────────────────────────────────────────────────────

/// Column-major tabular data structure.
///
/// Stores uniquely named columns of equal length. Engines take a `&Table`
/// and hand back a new one; nothing edits a table in place once it has
/// been produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Creates an empty table with no columns or rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(name, column)` pairs in order.
    pub fn from_columns<I>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Column)>,
    {
        let mut table = Self::new();
        for (name, column) in columns {
            table.add_column(name, column)?;
        }
        Ok(table)
    }

    /// Adds a named column while the table is being assembled.
    ///
    /// Fails if the name is already taken or the length differs from the
    /// existing row count (unless this is the first column).
    pub fn add_column(&mut self, name: String, column: Column) -> Result<()> {
        if self.names.iter().any(|n| *n == name) {
            return Err(Error::DuplicateColumn { name });
        }
        let col_len = column.len();
        if self.columns.is_empty() {
            self.row_count = col_len;
        } else if col_len != self.row_count {
            return Err(Error::DimensionMismatch {
                expected: self.row_count,
                actual: col_len,
            });
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Returns the number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Returns the number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the table has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns column names in order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Returns a reference to the column at `index`.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns a reference to the column with the given `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Like [`column_by_name`](Self::column_by_name) but a missing column
    /// is an error.
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column_by_name(name).ok_or_else(|| Error::ColumnNotFound {
            name: name.to_string(),
        })
    }

    /// Returns the index of the column with the given `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Returns an iterator over (name, column) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(|s| s.as_str()).zip(self.columns.iter())
    }

    /// Names of the columns of `kind`, in column order.
    pub fn names_of_kind(&self, kind: ColumnKind) -> Vec<&str> {
        self.iter()
            .filter(|(_, c)| c.kind() == kind)
            .map(|(n, _)| n)
            .collect()
    }

    /// Returns `(name, kind)` for every column.
    pub fn schema(&self) -> Vec<(&str, ColumnKind)> {
        self.iter().map(|(n, c)| (n, c.kind())).collect()
    }

    /// Returns the total number of Missing cells across all columns.
    pub fn total_null_count(&self) -> usize {
        self.columns.iter().map(|c| c.null_count()).sum()
    }

    /// Approximate heap footprint of all columns in bytes.
    pub fn memory_bytes(&self) -> usize {
        let names: usize = self.names.iter().map(|n| n.len()).sum();
        names + self.columns.iter().map(|c| c.memory_bytes()).sum::<usize>()
    }

    /// Returns a new table holding only `rows`, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            row_count: rows.len(),
        }
    }

    /// Returns a new table with the first `n` rows.
    pub fn head(&self, n: usize) -> Self {
        let rows: Vec<usize> = (0..n.min(self.row_count)).collect();
        self.take_rows(&rows)
    }

    /// Returns a new table with every column passed through `f`.
    ///
    /// `f` must keep the row count.
    pub(crate) fn map_columns<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&str, &Column) -> Column,
    {
        let columns: Vec<Column> = self.iter().map(|(n, c)| f(n, c)).collect();
        debug_assert!(columns.iter().all(|c| c.len() == self.row_count));
        Self {
            names: self.names.clone(),
            columns,
            row_count: self.row_count,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
