//! Declarative row filtering.
//!
//! A [`FilterSpec`] bundles optional per-column criteria; [`apply`]
//! keeps the rows that satisfy all of them and returns a new table.
//!
//! | Criterion | Keeps a row when | Column kinds |
//! |-----------|------------------|--------------|
//! | categories | the cell's text form is in the allow-set | any |
//! | numeric | `min <= value <= max` for each present bound | Numeric |
//! | dates | `start <= value <= end + 1 day − 1 s` | Datetime |
//!
//! Criteria are combined with AND and commute. An empty allow-set, a
//! range without usable bounds, an unknown column or a column of the
//! wrong kind imposes no constraint. Missing cells fail every active
//! criterion.
//!
//! ```
//! use u_bizlens::filter::{apply, FilterSpec};
//! use u_bizlens::table::{Column, Table};
//!
//! let table = Table::from_columns(vec![
//!     ("Country".to_string(), Column::categorical_from(vec![Some("US"), Some("FR"), Some("US")])),
//!     ("Sales".to_string(), Column::numeric_from(vec![Some(100.0), Some(50.0), Some(200.0)])),
//! ])
//! .unwrap();
//!
//! let spec = FilterSpec::new()
//!     .with_categories("Country", ["US"])
//!     .with_numeric("Sales", Some(150.0), None);
//! let outcome = apply(&table, &spec);
//!
//! assert_eq!(outcome.matched, 1);
//! assert_eq!(outcome.message(), "1 of 3 rows match the applied filters.");
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::format::format_count;
use crate::inference::parse_datetime;
use crate::table::{render_datetime, render_number, Column, ColumnKind, Table};

// ── Criteria ──────────────────────────────────────────────────────────

/// Inclusive numeric bounds; an absent bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    fn bounds(&self) -> (Option<f64>, Option<f64>) {
        let usable = |b: Option<f64>| b.filter(|v| !v.is_nan());
        (usable(self.min), usable(self.max))
    }

    fn is_active(&self) -> bool {
        let (min, max) = self.bounds();
        min.is_some() || max.is_some()
    }

    fn contains(&self, value: f64) -> bool {
        let (min, max) = self.bounds();
        min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m)
    }
}

/// Date bounds as text; `end` includes the whole end day.
///
/// Bounds that do not parse as dates are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateRange {
    fn bounds(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        let start = self.start.as_deref().and_then(parse_datetime);
        let end = self
            .end
            .as_deref()
            .and_then(parse_datetime)
            .and_then(|e| e.checked_add_signed(Duration::days(1) - Duration::seconds(1)));
        (start, end)
    }
}

/// Per-column filter criteria, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Column → inclusive numeric range.
    pub numeric: BTreeMap<String, NumericRange>,
    /// Column → permitted text representations.
    pub categories: BTreeMap<String, BTreeSet<String>>,
    /// Column → date range.
    pub dates: BTreeMap<String, DateRange>,
}

impl FilterSpec {
    /// An empty (identity) filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a numeric range on `column`.
    pub fn with_numeric(mut self, column: &str, min: Option<f64>, max: Option<f64>) -> Self {
        self.numeric
            .insert(column.to_string(), NumericRange { min, max });
        self
    }

    /// Adds a categorical allow-set on `column`.
    pub fn with_categories<S, I>(mut self, column: &str, allowed: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        self.categories.insert(
            column.to_string(),
            allowed.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Adds a date range on `column`.
    pub fn with_dates(mut self, column: &str, start: Option<&str>, end: Option<&str>) -> Self {
        self.dates.insert(
            column.to_string(),
            DateRange {
                start: start.map(str::to_string),
                end: end.map(str::to_string),
            },
        );
        self
    }

    /// Returns `true` if no criterion can exclude a row.
    pub fn is_identity(&self) -> bool {
        self.categories.values().all(BTreeSet::is_empty)
            && self.numeric.values().all(|r| !r.is_active())
            && self.dates.values().all(|r| r.bounds() == (None, None))
    }
}

// ── Outcome ───────────────────────────────────────────────────────────

/// Result of [`apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Rows that matched, in original order.
    pub table: Table,
    /// Number of matching rows.
    pub matched: usize,
    /// Number of rows before filtering.
    pub total: usize,
}

impl FilterOutcome {
    /// "`matched` of `total` rows match the applied filters."
    pub fn message(&self) -> String {
        format!(
            "{} of {} rows match the applied filters.",
            format_count(self.matched),
            format_count(self.total)
        )
    }
}

// ── Apply ─────────────────────────────────────────────────────────────

/// Applies `spec` to `table`, returning the matching rows as a new table.
pub fn apply(table: &Table, spec: &FilterSpec) -> FilterOutcome {
    let mut keep = vec![true; table.row_count()];

    for (name, allowed) in &spec.categories {
        if allowed.is_empty() {
            continue;
        }
        if let Some(column) = table.column_by_name(name) {
            retain(&mut keep, |i| {
                column.display_at(i).is_some_and(|v| allowed.contains(&v))
            });
        }
    }

    for (name, range) in &spec.numeric {
        if !range.is_active() {
            continue;
        }
        if let Some(column @ Column::Numeric { .. }) = table.column_by_name(name) {
            retain(&mut keep, |i| {
                column.numeric_at(i).is_some_and(|v| range.contains(v))
            });
        }
    }

    for (name, range) in &spec.dates {
        let (start, end) = range.bounds();
        if start.is_none() && end.is_none() {
            continue;
        }
        if let Some(column @ Column::Datetime { .. }) = table.column_by_name(name) {
            retain(&mut keep, |i| {
                column.datetime_at(i).is_some_and(|v| {
                    start.map_or(true, |s| v >= s) && end.map_or(true, |e| v <= e)
                })
            });
        }
    }

    let rows: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect();
    let outcome = FilterOutcome {
        matched: rows.len(),
        total: table.row_count(),
        table: table.take_rows(&rows),
    };
    debug!(
        matched = outcome.matched,
        total = outcome.total,
        "applied filter"
    );
    outcome
}

fn retain(keep: &mut [bool], pred: impl Fn(usize) -> bool) {
    for (i, k) in keep.iter_mut().enumerate() {
        if *k && !pred(i) {
            *k = false;
        }
    }
}

// ── Filter controls ───────────────────────────────────────────────────

/// Column names grouped by kind, for building filter controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub categorical: Vec<String>,
    pub numeric: Vec<String>,
    pub datetime: Vec<String>,
}

/// Lists the columns of `table` that each criterion type can target.
pub fn filter_options(table: &Table) -> FilterOptions {
    let names = |kind: ColumnKind| -> Vec<String> {
        table
            .names_of_kind(kind)
            .into_iter()
            .map(str::to_string)
            .collect()
    };
    FilterOptions {
        categorical: names(ColumnKind::Categorical),
        numeric: names(ColumnKind::Numeric),
        datetime: names(ColumnKind::Datetime),
    }
}

/// Distinct present values of `column` in the column's natural order,
/// rendered the way a categorical criterion compares them.
///
/// Empty when the column does not exist.
pub fn distinct_values(table: &Table, column: &str) -> Vec<String> {
    let Some(col) = table.column_by_name(column) else {
        return Vec::new();
    };
    match col {
        Column::Numeric { values, validity } => {
            let mut v: Vec<f64> = validity.valid_indices().map(|i| values[i]).collect();
            v.sort_by(f64::total_cmp);
            v.dedup();
            v.into_iter().map(render_number).collect()
        }
        Column::Datetime { values, validity } => validity
            .valid_indices()
            .map(|i| values[i])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(render_datetime)
            .collect(),
        Column::Categorical { values, validity } => validity
            .valid_indices()
            .map(|i| values[i].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Table {
        Table::from_columns(vec![
            (
                "Region".to_string(),
                Column::categorical_from(vec![Some("N"), Some("S"), None, Some("E"), Some("N")]),
            ),
            (
                "Qty".to_string(),
                Column::numeric_from(vec![Some(5.0), Some(10.0), Some(15.0), None, Some(20.0)]),
            ),
            (
                "OrderDate".to_string(),
                Column::datetime_from(vec![
                    parse_datetime("2024-01-01"),
                    parse_datetime("2024-01-31 23:59:59"),
                    parse_datetime("2024-02-01"),
                    parse_datetime("2024-01-15 12:00"),
                    None,
                ]),
            ),
        ])
        .unwrap()
    }

    fn qty(outcome: &FilterOutcome) -> Vec<Option<f64>> {
        let col = outcome.table.column_by_name("Qty").unwrap();
        (0..col.len()).map(|i| col.numeric_at(i)).collect()
    }

    #[test]
    fn identity_keeps_everything() {
        let t = orders();
        let spec = FilterSpec::new().with_categories("Region", Vec::<String>::new());
        assert!(spec.is_identity());
        let outcome = apply(&t, &spec);
        assert_eq!(outcome.table, t);
        assert_eq!(outcome.matched, 5);
    }

    #[test]
    fn category_allow_set_excludes_missing() {
        let outcome = apply(&orders(), &FilterSpec::new().with_categories("Region", ["N", "E"]));
        assert_eq!(outcome.matched, 3);
        assert_eq!(qty(&outcome), vec![Some(5.0), None, Some(20.0)]);
    }

    #[test]
    fn category_matches_text_form_of_any_kind() {
        let outcome = apply(&orders(), &FilterSpec::new().with_categories("Qty", ["10", "20"]));
        assert_eq!(qty(&outcome), vec![Some(10.0), Some(20.0)]);
    }

    #[test]
    fn numeric_range_inclusive_and_missing_excluded() {
        let outcome = apply(&orders(), &FilterSpec::new().with_numeric("Qty", Some(10.0), Some(15.0)));
        assert_eq!(qty(&outcome), vec![Some(10.0), Some(15.0)]);

        let outcome = apply(&orders(), &FilterSpec::new().with_numeric("Qty", None, Some(10.0)));
        assert_eq!(outcome.matched, 2);
    }

    #[test]
    fn numeric_on_wrong_kind_is_ignored() {
        let outcome = apply(&orders(), &FilterSpec::new().with_numeric("Region", Some(1.0), None));
        assert_eq!(outcome.matched, 5);
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let spec = FilterSpec::new()
            .with_categories("Nope", ["x"])
            .with_dates("Missing", Some("2024-01-01"), None);
        assert_eq!(apply(&orders(), &spec).matched, 5);
    }

    #[test]
    fn end_date_includes_whole_day() {
        let spec = FilterSpec::new().with_dates("OrderDate", None, Some("2024-01-31"));
        let outcome = apply(&orders(), &spec);
        // 23:59:59 on the end day is in, the next midnight is out
        assert_eq!(qty(&outcome), vec![Some(5.0), Some(10.0), None]);
    }

    #[test]
    fn start_date_and_day_first_bounds() {
        let spec = FilterSpec::new().with_dates("OrderDate", Some("15/01/2024"), Some("15/01/2024"));
        let outcome = apply(&orders(), &spec);
        assert_eq!(outcome.matched, 1);
        assert_eq!(qty(&outcome), vec![None]);
    }

    #[test]
    fn unparseable_date_bounds_are_absent() {
        let spec = FilterSpec::new().with_dates("OrderDate", Some("soon"), Some("later"));
        assert!(spec.is_identity());
        assert_eq!(apply(&orders(), &spec).matched, 5);

        let spec = FilterSpec::new().with_dates("OrderDate", Some("garbage"), Some("2024-01-01"));
        assert_eq!(apply(&orders(), &spec).matched, 1);
    }

    #[test]
    fn criteria_commute() {
        let t = orders();
        let a = FilterSpec::new()
            .with_categories("Region", ["N", "S"])
            .with_numeric("Qty", Some(6.0), None);
        let b = FilterSpec::new()
            .with_numeric("Qty", Some(6.0), None)
            .with_categories("Region", ["S", "N"]);
        assert_eq!(apply(&t, &a), apply(&t, &b));
        assert_eq!(apply(&t, &a).matched, 2);
    }

    #[test]
    fn message_uses_thousands_separators() {
        let outcome = FilterOutcome {
            table: Table::new(),
            matched: 1200,
            total: 15000,
        };
        assert_eq!(outcome.message(), "1,200 of 15,000 rows match the applied filters.");
    }

    #[test]
    fn spec_from_json() {
        let spec: FilterSpec = serde_json::from_str(
            r#"{"categories": {"Region": ["N"]}, "numeric": {"Qty": {"min": 10}}}"#,
        )
        .unwrap();
        assert_eq!(spec.numeric["Qty"], NumericRange { min: Some(10.0), max: None });
        assert_eq!(apply(&orders(), &spec).matched, 1);
    }

    #[test]
    fn options_and_distinct_values() {
        let t = orders();
        let options = filter_options(&t);
        assert_eq!(options.categorical, vec!["Region"]);
        assert_eq!(options.numeric, vec!["Qty"]);
        assert_eq!(options.datetime, vec!["OrderDate"]);

        assert_eq!(distinct_values(&t, "Region"), vec!["E", "N", "S"]);
        assert_eq!(distinct_values(&t, "Qty"), vec!["5", "10", "15", "20"]);
        assert_eq!(distinct_values(&t, "OrderDate")[0], "2024-01-01");
        assert!(distinct_values(&t, "Nope").is_empty());
    }

    #[test]
    fn empty_table() {
        let outcome = apply(&Table::new(), &FilterSpec::new().with_categories("x", ["a"]));
        assert_eq!((outcome.matched, outcome.total), (0, 0));
    }
}
