//! Plain aggregates for a charting surface.
//!
//! Each helper returns serializable points; drawing them is the caller's
//! business. Naming a column that does not exist fails with
//! [`Error::ColumnNotFound`], a column of the wrong kind with
//! [`Error::KindMismatch`].

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::ChartConfig;
use crate::error::Result;
use crate::grouping::{expect_kind, group_by, group_by_day, rank_descending, Aggregation};
use crate::stats;
use crate::table::{ColumnKind, Table};

/// One day of a time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// One bar of a category chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBar {
    pub category: String,
    pub value: f64,
}

/// One histogram bin covering `[lower, upper)` (the last bin is closed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// One scatter point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
}

/// Aggregates `value_column` per calendar day of `date_column`, ascending.
pub fn time_series(
    table: &Table,
    date_column: &str,
    value_column: &str,
    agg: Aggregation,
) -> Result<Vec<SeriesPoint>> {
    Ok(group_by_day(table, date_column, value_column, agg)?
        .into_iter()
        .map(|(date, value)| SeriesPoint { date, value })
        .collect())
}

/// Aggregates `value_column` per category, largest first, keeping `top_n`.
pub fn category_bars(
    table: &Table,
    category_column: &str,
    value_column: &str,
    agg: Aggregation,
    top_n: usize,
) -> Result<Vec<CategoryBar>> {
    let mut groups = group_by(table, category_column, value_column, agg)?;
    rank_descending(&mut groups);
    Ok(groups
        .into_iter()
        .take(top_n)
        .map(|g| CategoryBar {
            category: g.key,
            value: g.value,
        })
        .collect())
}

/// Equal-width histogram of a numeric column over `[min, max]`.
///
/// Empty when the column has no present values. A constant column yields
/// a single bin.
pub fn histogram(table: &Table, column: &str, bins: usize) -> Result<Vec<HistogramBin>> {
    let col = table.require(column)?;
    expect_kind(column, col, ColumnKind::Numeric)?;
    let values = col.valid_numeric_values().unwrap_or_default();

    let (Some(lo), Some(hi)) = (stats::min(&values), stats::max(&values)) else {
        return Ok(Vec::new());
    };
    if lo == hi || bins <= 1 {
        return Ok(vec![HistogramBin {
            lower: lo,
            upper: hi,
            count: values.len(),
        }]);
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + width * i as f64,
            upper: if i + 1 == bins {
                hi
            } else {
                lo + width * (i + 1) as f64
            },
            count,
        })
        .collect())
}

/// Complete `(x, y)` pairs of two numeric columns, thinned by an even
/// stride to at most `max_points`.
pub fn scatter(table: &Table, x: &str, y: &str, max_points: usize) -> Result<Vec<ScatterPoint>> {
    let xs = table.require(x)?;
    expect_kind(x, xs, ColumnKind::Numeric)?;
    let ys = table.require(y)?;
    expect_kind(y, ys, ColumnKind::Numeric)?;

    let points: Vec<ScatterPoint> = (0..table.row_count())
        .filter_map(|i| {
            Some(ScatterPoint {
                x: xs.numeric_at(i)?,
                y: ys.numeric_at(i)?,
            })
        })
        .collect();
    if points.len() <= max_points {
        return Ok(points);
    }
    let n = points.len();
    Ok((0..max_points).map(|i| points[i * n / max_points]).collect())
}

/// Numeric columns worth plotting as distributions.
///
/// Skips identifier-like names (`id`, `invoice`, `code`, ...) unless that
/// would leave nothing, in which case every numeric column is returned.
pub fn numeric_columns_for_distribution<'a>(table: &'a Table, config: &ChartConfig) -> Vec<&'a str> {
    let numeric = table.names_of_kind(ColumnKind::Numeric);
    let measures: Vec<&str> = numeric
        .iter()
        .copied()
        .filter(|n| !config.id_tokens.matches(n))
        .collect();
    if measures.is_empty() {
        numeric
    } else {
        measures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::inference::parse_datetime;
    use crate::table::Column;

    fn shop() -> Table {
        Table::from_columns(vec![
            (
                "Date".to_string(),
                Column::datetime_from(vec![
                    parse_datetime("2024-03-02"),
                    parse_datetime("2024-03-01 08:00"),
                    parse_datetime("2024-03-02 18:00"),
                    None,
                ]),
            ),
            (
                "Category".to_string(),
                Column::categorical_from(vec![Some("toys"), Some("food"), Some("food"), Some("tools")]),
            ),
            (
                "CustomerID".to_string(),
                Column::numeric_from(vec![Some(17.0), Some(18.0), Some(19.0), Some(20.0)]),
            ),
            (
                "Amount".to_string(),
                Column::numeric_from(vec![Some(12.0), Some(4.0), Some(6.0), None]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn daily_series() {
        let series = time_series(&shop(), "Date", "Amount", Aggregation::Sum).unwrap();
        assert_eq!(
            series,
            vec![
                SeriesPoint { date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), value: 4.0 },
                SeriesPoint { date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), value: 18.0 },
            ]
        );
        let json = serde_json::to_value(&series[0]).unwrap();
        assert_eq!(json["date"], "2024-03-01");
    }

    #[test]
    fn bars_ranked_and_truncated() {
        let bars = category_bars(&shop(), "Category", "Amount", Aggregation::Sum, 2).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0], CategoryBar { category: "toys".into(), value: 12.0 });
        assert_eq!(bars[1].category, "food");

        let bars = category_bars(&shop(), "Category", "Amount", Aggregation::Count, 10).unwrap();
        assert_eq!(bars[0].category, "food");
        assert_eq!(bars[0].value, 2.0);
    }

    #[test]
    fn histogram_bins() {
        let t = Table::from_columns(vec![(
            "v".to_string(),
            Column::numeric_from((0..=10).map(|i| Some(i as f64))),
        )])
        .unwrap();
        let bins = histogram(&t, "v", 5).unwrap();
        assert_eq!(bins.len(), 5);
        assert_eq!(bins[0].lower, 0.0);
        assert_eq!(bins[4].upper, 10.0);
        // max lands in the closed last bin
        assert_eq!(bins.iter().map(|b| b.count).collect::<Vec<_>>(), vec![2, 2, 2, 2, 3]);
    }

    #[test]
    fn histogram_degenerate() {
        let t = Table::from_columns(vec![
            ("c".to_string(), Column::numeric_from(vec![Some(3.0), Some(3.0)])),
            ("e".to_string(), Column::numeric_from(vec![None, None])),
        ])
        .unwrap();
        let bins = histogram(&t, "c", 10).unwrap();
        assert_eq!(bins, vec![HistogramBin { lower: 3.0, upper: 3.0, count: 2 }]);
        assert!(histogram(&t, "e", 10).unwrap().is_empty());
    }

    #[test]
    fn scatter_complete_pairs_and_thinning() {
        let points = scatter(&shop(), "CustomerID", "Amount", 100).unwrap();
        assert_eq!(points.len(), 3);

        let t = Table::from_columns(vec![
            ("x".to_string(), Column::numeric_from((0..10).map(|i| Some(i as f64)))),
            ("y".to_string(), Column::numeric_from((0..10).map(|i| Some(i as f64)))),
        ])
        .unwrap();
        let thinned = scatter(&t, "x", "y", 5).unwrap();
        let xs: Vec<f64> = thinned.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn distribution_columns_skip_identifiers() {
        let t = shop();
        assert_eq!(
            numeric_columns_for_distribution(&t, &ChartConfig::default()),
            vec!["Amount"]
        );

        let ids_only = Table::from_columns(vec![(
            "InvoiceNo".to_string(),
            Column::numeric_from(vec![Some(1.0)]),
        )])
        .unwrap();
        assert_eq!(
            numeric_columns_for_distribution(&ids_only, &ChartConfig::default()),
            vec!["InvoiceNo"]
        );
    }

    #[test]
    fn errors() {
        let t = shop();
        assert!(matches!(
            histogram(&t, "Nope", 5),
            Err(Error::ColumnNotFound { name }) if name == "Nope"
        ));
        assert!(matches!(
            scatter(&t, "Category", "Amount", 10),
            Err(Error::KindMismatch { actual: ColumnKind::Categorical, .. })
        ));
        assert!(matches!(
            time_series(&t, "Amount", "Amount", Aggregation::Sum),
            Err(Error::KindMismatch { expected: ColumnKind::Datetime, .. })
        ));
    }
}
