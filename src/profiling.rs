//! Descriptive profiling of a typed table.
//!
//! The profiler summarizes numeric and categorical columns, counts
//! Missing cells and builds the Pearson correlation matrix. Missing
//! values are expected input, not errors: every statistic is computed
//! over present values only and undefined statistics come back as NaN
//! (serialized as `null`).
//!
//! # Example
//!
//! ```
//! use u_bizlens::config::InferenceConfig;
//! use u_bizlens::csv_reader::CsvReader;
//! use u_bizlens::inference::infer;
//! use u_bizlens::profiling::profile;
//!
//! let csv = "Region,Units,Price\nN,1,10\nS,2,20\nN,NA,30\nE,4,40\n";
//! let raw = CsvReader::new().parse_str(csv).unwrap();
//! let report = profile(&infer(&raw, &InferenceConfig::default()));
//!
//! assert_eq!(report.numeric.len(), 2);
//! assert_eq!(report.numeric[0].count, 3);
//! assert_eq!(report.missing.get("Units"), Some(&1));
//! assert_eq!(report.categorical.get("Region").unwrap().top.as_deref(), Some("N"));
//! assert_eq!(report.correlation.get("Units", "Units").unwrap(), 1.0);
//! ```

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::stats;
use crate::table::{Column, ColumnKind, Table};

/// Sample values listed per column in [`ColumnInfo`].
const SAMPLE_VALUES: usize = 5;

// ── Column map ────────────────────────────────────────────────────────

/// Column-keyed entries in table column order.
///
/// Serializes as a JSON object whose keys keep the column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap<T>(Vec<(String, T)>);

impl<T> ColumnMap<T> {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn insert(&mut self, column: &str, value: T) {
        self.0.push((column.to_string(), value));
    }

    /// Returns the entry for `column`.
    pub fn get(&self, column: &str) -> Option<&T> {
        self.0.iter().find(|(n, _)| n == column).map(|(_, v)| v)
    }

    /// Iterates over `(column, entry)` in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Serialize> Serialize for ColumnMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Missing cell count per column.
pub type MissingReport = ColumnMap<usize>;

impl MissingReport {
    /// Sum of Missing cells across all columns.
    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, n)| n).sum()
    }
}

// ── Summaries ─────────────────────────────────────────────────────────

/// Descriptive statistics for one numeric column (present values only).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    /// Column name.
    pub column: String,
    /// Number of present values.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (n − 1). NaN below two values.
    pub std: f64,
    /// Minimum value.
    pub min: f64,
    /// 25th percentile.
    pub p25: f64,
    /// Median.
    pub p50: f64,
    /// 75th percentile.
    pub p75: f64,
    /// Maximum value.
    pub max: f64,
}

impl NumericSummary {
    fn of(column: &str, data: &[f64]) -> Self {
        let sorted = stats::sorted(data);
        let q = |p| stats::quantile_sorted(&sorted, p).unwrap_or(f64::NAN);
        Self {
            column: column.to_string(),
            count: data.len(),
            mean: stats::mean(data).unwrap_or(f64::NAN),
            std: stats::std_dev(data).unwrap_or(f64::NAN),
            min: sorted.first().copied().unwrap_or(f64::NAN),
            p25: q(0.25),
            p50: q(0.5),
            p75: q(0.75),
            max: sorted.last().copied().unwrap_or(f64::NAN),
        }
    }
}

/// Cardinality and mode of one categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoricalSummary {
    /// Distinct present values.
    pub unique: usize,
    /// Most frequent value; ties go to the value that sorts first.
    pub top: Option<String>,
    /// Occurrences of `top`.
    pub top_count: usize,
}

impl CategoricalSummary {
    fn of(values: &[String], column: &Column) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for i in column.validity().valid_indices() {
            *counts.entry(values[i].as_str()).or_default() += 1;
        }
        let mut top: Option<(&str, usize)> = None;
        for (&value, &n) in &counts {
            if top.map_or(true, |(_, best)| n > best) {
                top = Some((value, n));
            }
        }
        Self {
            unique: counts.len(),
            top: top.map(|(v, _)| v.to_string()),
            top_count: top.map_or(0, |(_, n)| n),
        }
    }
}

// ── Correlation ───────────────────────────────────────────────────────

/// Symmetric Pearson correlation matrix over the numeric columns.
///
/// The diagonal is 1.0. Off-diagonal entries are NaN when fewer than two
/// complete pairs exist or either side is constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    /// Numeric column names, in table order.
    pub columns: Vec<String>,
    /// Row-major `columns.len() × columns.len()` coefficients.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Computes the matrix for every numeric column of `table`.
    ///
    /// A table with no rows yields an empty matrix.
    pub fn compute(table: &Table) -> Self {
        if table.row_count() == 0 {
            return Self {
                columns: Vec::new(),
                values: Vec::new(),
            };
        }
        let numeric: Vec<(&str, Vec<Option<f64>>)> = table
            .iter()
            .filter(|(_, c)| c.kind() == ColumnKind::Numeric)
            .map(|(n, c)| (n, (0..c.len()).map(|i| c.numeric_at(i)).collect()))
            .collect();

        let k = numeric.len();
        let mut values = vec![vec![f64::NAN; k]; k];
        for i in 0..k {
            values[i][i] = 1.0;
            for j in (i + 1)..k {
                let r = stats::pearson_pairwise(&numeric[i].1, &numeric[j].1).unwrap_or(f64::NAN);
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        Self {
            columns: numeric.into_iter().map(|(n, _)| n.to_string()).collect(),
            values,
        }
    }

    /// Coefficient between columns `a` and `b`.
    ///
    /// # Errors
    ///
    /// [`Error::ColumnNotFound`] if either name is not a numeric column of
    /// the profiled table.
    pub fn get(&self, a: &str, b: &str) -> Result<f64> {
        let i = self.position(a)?;
        let j = self.position(b)?;
        Ok(self.values[i][j])
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::ColumnNotFound {
                name: name.to_string(),
            })
    }

    /// Number of numeric columns in the matrix.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ── Profile report ────────────────────────────────────────────────────

/// Complete descriptive profile of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileReport {
    /// Number of rows profiled.
    pub row_count: usize,
    /// One summary per numeric column, in column order.
    pub numeric: Vec<NumericSummary>,
    /// Summary per categorical column.
    pub categorical: ColumnMap<CategoricalSummary>,
    /// Missing cell count for every column.
    pub missing: MissingReport,
    /// Pearson correlation across numeric columns.
    pub correlation: CorrelationMatrix,
}

impl ProfileReport {
    /// Total Missing cells across the table.
    pub fn missing_total(&self) -> usize {
        self.missing.total()
    }
}

/// Profiles every column of `table`.
///
/// With zero rows the numeric summaries and the correlation matrix are
/// empty; the missing report still lists every column.
pub fn profile(table: &Table) -> ProfileReport {
    let mut numeric = Vec::new();
    let mut categorical = ColumnMap::new();
    let mut missing = ColumnMap::new();

    for (name, column) in table.iter() {
        missing.insert(name, column.null_count());
        match column {
            Column::Numeric { .. } if table.row_count() == 0 => {}
            Column::Numeric { .. } => {
                let data = column.valid_numeric_values().unwrap_or_default();
                numeric.push(NumericSummary::of(name, &data));
            }
            Column::Categorical { values, .. } => {
                categorical.insert(name, CategoricalSummary::of(values, column));
            }
            Column::Datetime { .. } => {}
        }
    }

    let correlation = CorrelationMatrix::compute(table);
    debug!(
        rows = table.row_count(),
        numeric = numeric.len(),
        categorical = categorical.len(),
        missing = missing.total(),
        "profiled table"
    );
    ProfileReport {
        row_count: table.row_count(),
        numeric,
        categorical,
        missing,
        correlation,
    }
}

// ── Dataset info ──────────────────────────────────────────────────────

/// Column counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub numeric: usize,
    pub categorical: usize,
    pub datetime: usize,
}

impl KindCounts {
    /// Counts the columns of `table` by kind.
    pub fn of(table: &Table) -> Self {
        let mut counts = Self::default();
        for (_, column) in table.iter() {
            match column.kind() {
                ColumnKind::Numeric => counts.numeric += 1,
                ColumnKind::Categorical => counts.categorical += 1,
                ColumnKind::Datetime => counts.datetime += 1,
            }
        }
        counts
    }
}

/// Shape and schema of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub columns: usize,
    /// Kind of every column.
    pub kinds: ColumnMap<ColumnKind>,
    pub kind_counts: KindCounts,
    /// Approximate in-memory size.
    pub memory_bytes: usize,
}

/// Returns the shape, schema and approximate footprint of `table`.
pub fn dataset_info(table: &Table) -> DatasetInfo {
    let mut kinds = ColumnMap::new();
    for (name, kind) in table.schema() {
        kinds.insert(name, kind);
    }
    DatasetInfo {
        rows: table.row_count(),
        columns: table.column_count(),
        kinds,
        kind_counts: KindCounts::of(table),
        memory_bytes: table.memory_bytes(),
    }
}

/// Details for a single column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    pub missing: usize,
    pub unique: usize,
    /// Up to five present values, in row order.
    pub samples: Vec<String>,
}

/// Returns details for `name`, or `None` if the column does not exist.
pub fn column_info(table: &Table, name: &str) -> Option<ColumnInfo> {
    let column = table.column_by_name(name)?;
    Some(ColumnInfo {
        name: name.to_string(),
        kind: column.kind(),
        missing: column.null_count(),
        unique: column.distinct_count(),
        samples: column
            .validity()
            .valid_indices()
            .take(SAMPLE_VALUES)
            .filter_map(|i| column.display_at(i))
            .collect(),
    })
}

/// First `n` rows of `table`.
pub fn preview(table: &Table, n: usize) -> Table {
    table.head(n)
}
