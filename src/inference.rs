//! Column type inference.
//!
//! Turns a raw table (text columns straight from a loader) into a typed
//! table by deciding, once per column, whether it is
//! [`Datetime`](ColumnKind::Datetime), [`Numeric`](ColumnKind::Numeric) or
//! stays [`Categorical`](ColumnKind::Categorical).
//!
//! # Algorithm
//!
//! For each column, in order:
//!
//! 1. Datetime and Numeric columns pass through untouched.
//! 2. A text column whose name contains a date token is parsed cell by
//!    cell as a date. If the share of parsed cells is **strictly greater**
//!    than the date threshold (0.5), it becomes Datetime.
//! 3. Otherwise a text column is parsed cell by cell as a number and
//!    becomes Numeric under the same strict comparison.
//!
//! The share is taken over *all* rows, so cells that were already
//! Missing count against the column; an all-Missing column never
//! converts. Cells that fail to parse in a converted column become
//! Missing.
//!
//! Running [`infer`] on its own output returns an identical table.
//!
//! # Date convention
//!
//! Numeric dates are read **day-first**: `03/04/2024` is 3 April 2024.
//! ISO `YYYY-MM-DD` forms are always tried first; month-first numeric
//! forms are never attempted.
//!
//! # Example
//!
//! ```
//! use u_bizlens::config::InferenceConfig;
//! use u_bizlens::csv_reader::CsvReader;
//! use u_bizlens::inference::infer;
//! use u_bizlens::table::ColumnKind;
//!
//! let raw = CsvReader::new()
//!     .parse_str("Order Date,Sales,Region\n2024-01-05,10.5,North\n06/01/2024,oops,South\n")
//!     .unwrap();
//! let typed = infer(&raw, &InferenceConfig::default());
//!
//! assert_eq!(typed.column(0).unwrap().kind(), ColumnKind::Datetime);
//! // 1 of 2 cells parse: exactly 50% is not enough
//! assert_eq!(typed.column(1).unwrap().kind(), ColumnKind::Categorical);
//! assert_eq!(typed.column(2).unwrap().kind(), ColumnKind::Categorical);
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, trace};

use crate::config::InferenceConfig;
use crate::table::{Column, ColumnKind, Table, ValidityBitmap};

/// Timestamp layouts tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Date-only layouts tried in order; the result is midnight.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%B %d, %Y",
];

// ── Cell coercion ─────────────────────────────────────────────────────

/// Outcome of coercing one text cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<T> {
    /// The cell parsed.
    Value(T),
    /// The cell held text that did not parse.
    Failed,
    /// The cell was already Missing.
    Missing,
}

impl<T> Coerced<T> {
    /// Coerces an optional text cell with `parse`.
    pub fn from_cell(cell: Option<&str>, parse: impl Fn(&str) -> Option<T>) -> Self {
        match cell {
            None => Self::Missing,
            Some(text) => parse(text).map_or(Self::Failed, Self::Value),
        }
    }

    /// The parsed value, if any.
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Failed | Self::Missing => None,
        }
    }
}

/// Per-column count of coercion outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoercionTally {
    pub parsed: usize,
    pub failed: usize,
    pub missing: usize,
}

impl CoercionTally {
    /// Adds one outcome.
    pub fn record<T>(&mut self, outcome: &Coerced<T>) {
        match outcome {
            Coerced::Value(_) => self.parsed += 1,
            Coerced::Failed => self.failed += 1,
            Coerced::Missing => self.missing += 1,
        }
    }

    /// Total number of cells seen.
    pub fn total(&self) -> usize {
        self.parsed + self.failed + self.missing
    }

    /// Share of cells that parsed (0.0 when no cells were seen).
    pub fn success_fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.parsed as f64 / total as f64,
        }
    }

    /// Strict `>` comparison against `threshold`.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.success_fraction() > threshold
    }
}

/// A fully coerced text column.
struct Coercion<T> {
    cells: Vec<Coerced<T>>,
    tally: CoercionTally,
}

impl<T> Coercion<T> {
    fn run(values: &[String], validity: &ValidityBitmap, parse: impl Fn(&str) -> Option<T>) -> Self {
        let mut tally = CoercionTally::default();
        let cells = values
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let cell = validity.is_valid(i).then_some(text.as_str());
                let outcome = Coerced::from_cell(cell, &parse);
                tally.record(&outcome);
                outcome
            })
            .collect();
        Self { cells, tally }
    }

    fn into_values(self) -> impl Iterator<Item = Option<T>> {
        self.cells.into_iter().map(Coerced::value)
    }
}

// ── Parsers ───────────────────────────────────────────────────────────

/// Best-effort number parse.
///
/// Accepts standard float syntax after trimming; rejects empty text and
/// non-finite results such as `inf` or `NaN`.
///
/// ```
/// use u_bizlens::inference::parse_number;
///
/// assert_eq!(parse_number(" -1.5e3 "), Some(-1500.0));
/// assert_eq!(parse_number("+7"), Some(7.0));
/// assert_eq!(parse_number("1,234"), None);
/// assert_eq!(parse_number("inf"), None);
/// ```
pub fn parse_number(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Best-effort date/time parse (day-first for numeric dates).
///
/// ```
/// use chrono::NaiveDate;
/// use u_bizlens::inference::parse_datetime;
///
/// let d = parse_datetime("03/04/2024").unwrap();
/// assert_eq!(d.date(), NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
/// assert!(parse_datetime("2024-02-30").is_none());
/// ```
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(t, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(t).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(t, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ── Inference ─────────────────────────────────────────────────────────

/// Infers a kind for every column and returns the typed table.
///
/// Pure and deterministic; the input table is left untouched.
pub fn infer(raw: &Table, config: &InferenceConfig) -> Table {
    raw.map_columns(|name, column| infer_column(name, column, config))
}

/// Infers the kind of a single column, returning its typed replacement.
pub fn infer_column(name: &str, column: &Column, config: &InferenceConfig) -> Column {
    let (values, validity) = match column {
        Column::Numeric { .. } | Column::Datetime { .. } => return column.clone(),
        Column::Categorical { values, validity } => (values, validity),
    };

    if config.date_tokens.matches(name) {
        let dates = Coercion::run(values, validity, parse_datetime);
        trace!(column = name, tally = ?dates.tally, "date coercion");
        if dates.tally.exceeds(config.date_threshold) {
            log_decision(name, ColumnKind::Datetime, &dates.tally);
            return Column::datetime_from(dates.into_values());
        }
    }

    let numbers = Coercion::run(values, validity, parse_number);
    trace!(column = name, tally = ?numbers.tally, "numeric coercion");
    if numbers.tally.exceeds(config.numeric_threshold) {
        log_decision(name, ColumnKind::Numeric, &numbers.tally);
        return Column::numeric_from(numbers.into_values());
    }

    log_decision(name, ColumnKind::Categorical, &numbers.tally);
    column.clone()
}

fn log_decision(name: &str, kind: ColumnKind, tally: &CoercionTally) {
    debug!(
        column = name,
        kind = %kind,
        success = tally.success_fraction(),
        failed = tally.failed,
        missing = tally.missing,
        "inferred column kind"
    );
}
