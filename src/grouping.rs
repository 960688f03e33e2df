//! Group-by and aggregation kernel.
//!
//! Shared by the insight engine (performer rankings) and the chart data
//! helpers. Rows whose key is Missing are dropped; Missing values are
//! skipped by every aggregation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stats;
use crate::table::{Column, ColumnKind, Table};

/// How the values of one group are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Sum of present values (0 for none).
    #[default]
    Sum,
    /// Mean of present values (NaN for none).
    Mean,
    /// Number of present values.
    Count,
    /// Median of present values (NaN for none).
    Median,
}

impl Aggregation {
    /// Combines `values` (present values of one group).
    pub fn apply(self, values: &[f64]) -> f64 {
        match self {
            Self::Sum => values.iter().sum(),
            Self::Mean => stats::mean(values).unwrap_or(f64::NAN),
            Self::Count => values.len() as f64,
            Self::Median => stats::median(values).unwrap_or(f64::NAN),
        }
    }
}

/// One aggregated group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    /// Key as text (the cell's display form).
    pub key: String,
    /// Aggregated value.
    pub value: f64,
    /// Rows carrying this key.
    pub rows: usize,
}

struct Bucket {
    first_row: usize,
    rows: usize,
    values: Vec<f64>,
}

/// Groups `table` by `key_column` and aggregates `value_column`.
///
/// Groups come back in ascending key order (numeric, chronological or
/// lexicographic depending on the key column's kind).
///
/// # Errors
///
/// - [`Error::ColumnNotFound`] if either column does not exist.
/// - [`Error::KindMismatch`] if `value_column` is not numeric and
///   `agg` is not [`Aggregation::Count`].
pub fn group_by(
    table: &Table,
    key_column: &str,
    value_column: &str,
    agg: Aggregation,
) -> Result<Vec<Group>> {
    let keys = table.require(key_column)?;
    let values = table.require(value_column)?;
    if agg != Aggregation::Count {
        expect_kind(value_column, values, ColumnKind::Numeric)?;
    }

    let mut buckets: HashMap<String, Bucket> = HashMap::new();
    for row in 0..table.row_count() {
        let Some(key) = keys.display_at(row) else {
            continue;
        };
        let bucket = buckets.entry(key).or_insert_with(|| Bucket {
            first_row: row,
            rows: 0,
            values: Vec::new(),
        });
        bucket.rows += 1;
        if let Some(v) = present_value(values, row) {
            bucket.values.push(v);
        }
    }

    let mut buckets: Vec<(String, Bucket)> = buckets.into_iter().collect();
    buckets.sort_by(|a, b| compare_rows(keys, a.1.first_row, b.1.first_row));
    Ok(buckets
        .into_iter()
        .map(|(key, b)| Group {
            key,
            value: agg.apply(&b.values),
            rows: b.rows,
        })
        .collect())
}

/// Stable sort by value, largest first; NaN values go last.
pub fn rank_descending(groups: &mut [Group]) {
    groups.sort_by(|a, b| match (a.value.is_nan(), b.value.is_nan()) {
        (false, false) => b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal),
        (x, y) => x.cmp(&y),
    });
}

/// Aggregates `value_column` per calendar day of `date_column`,
/// ascending by day.
///
/// # Errors
///
/// Same as [`group_by`], plus [`Error::KindMismatch`] when `date_column`
/// is not a datetime column.
pub fn group_by_day(
    table: &Table,
    date_column: &str,
    value_column: &str,
    agg: Aggregation,
) -> Result<Vec<(NaiveDate, f64)>> {
    let dates = table.require(date_column)?;
    expect_kind(date_column, dates, ColumnKind::Datetime)?;
    let values = table.require(value_column)?;
    if agg != Aggregation::Count {
        expect_kind(value_column, values, ColumnKind::Numeric)?;
    }

    let mut days: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for row in 0..table.row_count() {
        let Some(dt) = dates.datetime_at(row) else {
            continue;
        };
        let bucket = days.entry(dt.date()).or_default();
        if let Some(v) = present_value(values, row) {
            bucket.push(v);
        }
    }
    Ok(days
        .into_iter()
        .map(|(day, vals)| (day, agg.apply(&vals)))
        .collect())
}

/// Rows per calendar day of a datetime column (Missing skipped).
pub fn daily_counts(column: &Column) -> BTreeMap<NaiveDate, usize> {
    let mut days = BTreeMap::new();
    for row in 0..column.len() {
        if let Some(dt) = column.datetime_at(row) {
            *days.entry(dt.date()).or_insert(0) += 1;
        }
    }
    days
}

pub(crate) fn expect_kind(name: &str, column: &Column, expected: ColumnKind) -> Result<()> {
    if column.kind() == expected {
        Ok(())
    } else {
        Err(Error::KindMismatch {
            column: name.to_string(),
            expected,
            actual: column.kind(),
        })
    }
}

/// Value used by an aggregation: the number itself, or 1.0 for a
/// present non-numeric cell (only reachable through `Count`).
fn present_value(column: &Column, row: usize) -> Option<f64> {
    match column {
        Column::Numeric { .. } => column.numeric_at(row),
        _ => column.is_valid(row).then_some(1.0),
    }
}

fn compare_rows(column: &Column, a: usize, b: usize) -> Ordering {
    match column {
        Column::Numeric { values, .. } => values[a].total_cmp(&values[b]),
        Column::Datetime { values, .. } => values[a].cmp(&values[b]),
        Column::Categorical { values, .. } => values[a].cmp(&values[b]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::parse_datetime;

    fn sales() -> Table {
        Table::from_columns(vec![
            (
                "Country".to_string(),
                Column::categorical_from(vec![Some("US"), Some("FR"), Some("US"), None, Some("DE")]),
            ),
            (
                "Sales".to_string(),
                Column::numeric_from(vec![Some(100.0), Some(50.0), Some(200.0), Some(999.0), None]),
            ),
            (
                "Store".to_string(),
                Column::numeric_from(vec![Some(10.0), Some(2.0), Some(10.0), Some(1.0), Some(2.0)]),
            ),
            (
                "Day".to_string(),
                Column::datetime_from(vec![
                    parse_datetime("2024-01-02 09:00"),
                    parse_datetime("2024-01-01"),
                    parse_datetime("2024-01-02 17:30"),
                    None,
                    parse_datetime("2024-01-01"),
                ]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn sum_per_group_in_key_order() {
        let groups = group_by(&sales(), "Country", "Sales", Aggregation::Sum).unwrap();
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["DE", "FR", "US"]);
        assert_eq!(groups[2].value, 300.0);
        assert_eq!(groups[2].rows, 2);
        // DE has no present values
        assert_eq!(groups[0].value, 0.0);
    }

    #[test]
    fn numeric_keys_sort_numerically() {
        let groups = group_by(&sales(), "Store", "Sales", Aggregation::Count).unwrap();
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "10"]);
        assert_eq!(groups[1].value, 1.0);
    }

    #[test]
    fn mean_and_median() {
        let groups = group_by(&sales(), "Country", "Sales", Aggregation::Mean).unwrap();
        assert_eq!(groups[2].value, 150.0);
        assert!(groups[0].value.is_nan());
        let groups = group_by(&sales(), "Country", "Sales", Aggregation::Median).unwrap();
        assert_eq!(groups[1].value, 50.0);
    }

    #[test]
    fn ranking_is_stable_and_nan_last() {
        let mut groups = group_by(&sales(), "Country", "Sales", Aggregation::Mean).unwrap();
        rank_descending(&mut groups);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["US", "FR", "DE"]);

        let mut ties = vec![
            Group { key: "a".into(), value: 1.0, rows: 1 },
            Group { key: "b".into(), value: 1.0, rows: 1 },
        ];
        rank_descending(&mut ties);
        assert_eq!(ties[0].key, "a");
    }

    #[test]
    fn count_accepts_any_value_kind() {
        let groups = group_by(&sales(), "Store", "Country", Aggregation::Count).unwrap();
        assert_eq!(groups[0].value, 0.0);
        assert_eq!(groups[2].value, 2.0);
    }

    #[test]
    fn errors() {
        let t = sales();
        assert!(matches!(
            group_by(&t, "Nope", "Sales", Aggregation::Sum),
            Err(Error::ColumnNotFound { .. })
        ));
        assert!(matches!(
            group_by(&t, "Store", "Country", Aggregation::Sum),
            Err(Error::KindMismatch { expected: ColumnKind::Numeric, .. })
        ));
        assert!(matches!(
            group_by_day(&t, "Country", "Sales", Aggregation::Sum),
            Err(Error::KindMismatch { expected: ColumnKind::Datetime, .. })
        ));
    }

    #[test]
    fn days() {
        let t = sales();
        let series = group_by_day(&t, "Day", "Sales", Aggregation::Sum).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(series[0].1, 50.0);
        assert_eq!(series[1].1, 300.0);

        let counts = daily_counts(t.column_by_name("Day").unwrap());
        assert_eq!(counts.values().copied().collect::<Vec<_>>(), vec![2, 2]);
    }
}
