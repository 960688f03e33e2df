//! Heuristic narrative insights.
//!
//! [`generate`] picks a grouping and a value column by keyword, ranks the
//! groups, and writes short markdown sections about missing data,
//! suspicious values, the date span and the overall dataset. It never
//! fails: a section whose preconditions are not met is left out.
//!
//! Sections, in order:
//!
//! 1. [`Performers`](SectionKind::Performers): best and worst group by summed value
//! 2. [`MissingData`](SectionKind::MissingData)
//! 3. [`Anomalies`](SectionKind::Anomalies): negative quantities and 3σ outliers
//! 4. [`Temporal`](SectionKind::Temporal): span, busiest and slowest day
//! 5. [`Summary`](SectionKind::Summary): always present
//!
//! # Example
//!
//! ```
//! use u_bizlens::config::InsightConfig;
//! use u_bizlens::insights::{generate, SectionKind};
//! use u_bizlens::table::{Column, Table};
//!
//! let table = Table::from_columns(vec![
//!     ("Country".to_string(), Column::categorical_from(vec![Some("US"), Some("FR"), Some("US")])),
//!     ("Sales".to_string(), Column::numeric_from(vec![Some(100.0), Some(50.0), Some(200.0)])),
//! ])
//! .unwrap();
//!
//! let report = generate(&table, &InsightConfig::default());
//! let top = report.top_performers.as_ref().unwrap();
//! assert_eq!(top.rows[0].key, "US");
//! assert_eq!(top.rows[0].total, 300.0);
//! assert_eq!(
//!     report.section(SectionKind::Performers).unwrap().lines[0],
//!     "**Top Performer:** US with 300 total Sales."
//! );
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::config::InsightConfig;
use crate::format::{format_count, format_number, percent_1dp};
use crate::grouping::{daily_counts, group_by, rank_descending, Aggregation, Group};
use crate::profiling::KindCounts;
use crate::stats;
use crate::table::{render_number, Column, ColumnKind, Table};

// ── Report types ──────────────────────────────────────────────────────

/// One ranked group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performer {
    pub key: String,
    pub total: f64,
}

/// Ranked groups with the columns they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformerTable {
    pub group_column: String,
    pub value_column: String,
    /// Largest total first.
    pub rows: Vec<Performer>,
}

/// Narrative section identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Performers,
    MissingData,
    Anomalies,
    Temporal,
    Summary,
}

/// One narrative section: markdown lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightSection {
    pub kind: SectionKind,
    pub lines: Vec<String>,
}

/// Output of [`generate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightReport {
    /// First `top_n` groups.
    pub top_performers: Option<PerformerTable>,
    /// Last `top_n` groups, still largest first.
    pub bottom_performers: Option<PerformerTable>,
    pub sections: Vec<InsightSection>,
}

impl InsightReport {
    /// Returns the section of `kind`, if it was produced.
    pub fn section(&self, kind: SectionKind) -> Option<&InsightSection> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Full narrative: sections separated by blank lines.
    pub fn text(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.lines.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ── Column roles ──────────────────────────────────────────────────────

/// Grouping and value column chosen for the performer ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roles<'a> {
    pub group: Option<&'a str>,
    pub value: Option<&'a str>,
}

/// Chooses the grouping and value columns of `table`.
///
/// Grouping candidates are the categorical columns followed by numeric
/// columns with fewer than `low_cardinality_limit` distinct values.
pub fn select_roles<'a>(table: &'a Table, config: &InsightConfig) -> Roles<'a> {
    let numeric = table.names_of_kind(ColumnKind::Numeric);
    let mut candidates = table.names_of_kind(ColumnKind::Categorical);
    candidates.extend(numeric.iter().copied().filter(|name| {
        table
            .column_by_name(name)
            .is_some_and(|c| c.distinct_count() < config.low_cardinality_limit)
    }));

    let value = numeric
        .iter()
        .copied()
        .find(|n| config.value_tokens.matches(n))
        .or_else(|| numeric.first().copied());
    let group = candidates
        .iter()
        .copied()
        .find(|n| config.group_tokens.matches(n))
        .or_else(|| candidates.first().copied());

    Roles { group, value }
}

// ── Generate ──────────────────────────────────────────────────────────

/// Builds the full insight report for `table`.
pub fn generate(table: &Table, config: &InsightConfig) -> InsightReport {
    let mut report = InsightReport {
        top_performers: None,
        bottom_performers: None,
        sections: Vec::new(),
    };

    if table.row_count() > 0 {
        let roles = select_roles(table, config);
        debug!(group = ?roles.group, value = ?roles.value, "insight roles");
        if let (Some(group), Some(value)) = (roles.group, roles.value) {
            if group != value {
                performers(table, group, value, config, &mut report);
            }
        }

        report.sections.push(missing_data(table, config));
        if let Some(section) = anomalies(table, config) {
            report.sections.push(section);
        }
        if let Some(section) = temporal(table) {
            report.sections.push(section);
        }
    }

    report.sections.push(summary(table));
    report
}

fn performers(
    table: &Table,
    group: &str,
    value: &str,
    config: &InsightConfig,
    report: &mut InsightReport,
) {
    let Ok(mut groups) = group_by(table, group, value, Aggregation::Sum) else {
        return;
    };
    rank_descending(&mut groups);
    let (Some(best), Some(worst)) = (groups.first(), groups.last()) else {
        return;
    };

    report.sections.push(InsightSection {
        kind: SectionKind::Performers,
        lines: vec![
            format!(
                "**Top Performer:** {} with {} total {value}.",
                best.key,
                format_number(best.value, 0)
            ),
            format!(
                "**Bottom Performer:** {} with {} total {value}.",
                worst.key,
                format_number(worst.value, 0)
            ),
        ],
    });

    let table_of = |rows: &[Group]| PerformerTable {
        group_column: group.to_string(),
        value_column: value.to_string(),
        rows: rows
            .iter()
            .map(|g| Performer {
                key: g.key.clone(),
                total: g.value,
            })
            .collect(),
    };
    let n = config.top_n.min(groups.len());
    report.top_performers = Some(table_of(&groups[..n]));
    report.bottom_performers = Some(table_of(&groups[groups.len() - n..]));
}

fn missing_data(table: &Table, config: &InsightConfig) -> InsightSection {
    let with_missing: Vec<(&str, usize)> = table
        .iter()
        .map(|(n, c)| (n, c.null_count()))
        .filter(|(_, missing)| *missing > 0)
        .collect();

    let lines = if with_missing.is_empty() {
        vec!["**Data Quality:** No missing values detected.".to_string()]
    } else {
        let mut lines = vec![format!(
            "**Missing Data:** {} columns contain missing values.",
            with_missing.len()
        )];
        lines.extend(
            with_missing
                .iter()
                .take(config.max_missing_columns)
                .map(|(name, missing)| {
                    format!(
                        "- {name}: {:.1}% missing ({} rows)",
                        percent_1dp(*missing, table.row_count()),
                        format_count(*missing)
                    )
                }),
        );
        lines
    };
    InsightSection {
        kind: SectionKind::MissingData,
        lines,
    }
}

fn anomalies(table: &Table, config: &InsightConfig) -> Option<InsightSection> {
    let numeric: Vec<(&str, &Column)> = table
        .iter()
        .filter(|(_, c)| c.kind() == ColumnKind::Numeric)
        .take(config.max_anomaly_columns)
        .collect();
    if numeric.is_empty() {
        return None;
    }

    let rows = table.row_count();
    let mut lines = Vec::new();
    for (name, column) in numeric {
        let values = column.valid_numeric_values().unwrap_or_default();

        if config.non_negative_tokens.matches(name) {
            let negatives = values.iter().filter(|v| **v < 0.0).count();
            if negatives > 0 {
                lines.push(format!(
                    "**Anomaly:** {name} contains {} negative values.",
                    format_count(negatives)
                ));
            }
        }

        let (Some(mean), Some(std)) = (stats::mean(&values), stats::std_dev(&values)) else {
            continue;
        };
        if std <= 0.0 {
            continue;
        }
        let band = config.outlier_sigma * std;
        let outliers = values
            .iter()
            .filter(|v| **v < mean - band || **v > mean + band)
            .count();
        if outliers > 0 && (outliers as f64) < rows as f64 * config.outlier_max_fraction {
            lines.push(format!(
                "**Outliers:** {name} has {} extreme values ({:.1}% beyond {} standard deviations).",
                format_count(outliers),
                percent_1dp(outliers, rows),
                render_number(config.outlier_sigma)
            ));
        }
    }

    if lines.is_empty() {
        lines.push("**No significant anomalies detected.**".to_string());
    }
    Some(InsightSection {
        kind: SectionKind::Anomalies,
        lines,
    })
}

fn temporal(table: &Table) -> Option<InsightSection> {
    let (_, column) = table
        .iter()
        .find(|(_, c)| c.kind() == ColumnKind::Datetime)?;

    let present: Vec<_> = (0..column.len())
        .filter_map(|i| column.datetime_at(i))
        .collect();
    let first = present.iter().min()?;
    let last = present.iter().max()?;

    let counts = daily_counts(column);
    // first maximum / minimum in date order: ties go to the earliest day
    let mut busiest: Option<(NaiveDate, usize)> = None;
    let mut slowest: Option<(NaiveDate, usize)> = None;
    for (&day, &n) in &counts {
        if busiest.map_or(true, |(_, best)| n > best) {
            busiest = Some((day, n));
        }
        if slowest.map_or(true, |(_, least)| n < least) {
            slowest = Some((day, n));
        }
    }
    let (busiest, slowest) = (busiest?, slowest?);

    Some(InsightSection {
        kind: SectionKind::Temporal,
        lines: vec![
            format!(
                "**Date Range:** {} to {} ({} days).",
                first.format("%Y-%m-%d"),
                last.format("%Y-%m-%d"),
                (*last - *first).num_days()
            ),
            format!(
                "**Busiest Day:** {} with {} records.",
                busiest.0.format("%Y-%m-%d"),
                format_count(busiest.1)
            ),
            format!(
                "**Slowest Day:** {} with {} records.",
                slowest.0.format("%Y-%m-%d"),
                format_count(slowest.1)
            ),
        ],
    })
}

fn summary(table: &Table) -> InsightSection {
    let kinds = KindCounts::of(table);
    let megabytes = table.memory_bytes() as f64 / (1024.0 * 1024.0);
    InsightSection {
        kind: SectionKind::Summary,
        lines: vec![
            format!(
                "**Dataset Size:** {} rows, {} columns.",
                format_count(table.row_count()),
                table.column_count()
            ),
            format!("**Memory Usage:** {megabytes:.2} MB."),
            format!(
                "**Column Types:** {} numeric, {} categorical, {} datetime.",
                kinds.numeric, kinds.categorical, kinds.datetime
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Vocabulary;
    use crate::inference::parse_datetime;

    fn table(columns: Vec<(&str, Column)>) -> Table {
        Table::from_columns(columns.into_iter().map(|(n, c)| (n.to_string(), c))).unwrap()
    }

    fn kinds(report: &InsightReport) -> Vec<SectionKind> {
        report.sections.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn roles_prefer_keywords() {
        let t = table(vec![
            ("Invoice", Column::categorical_from(vec![Some("a"), Some("b")])),
            ("Country", Column::categorical_from(vec![Some("US"), Some("FR")])),
            ("Id", Column::numeric_from(vec![Some(1.0), Some(2.0)])),
            ("Revenue", Column::numeric_from(vec![Some(5.0), Some(6.0)])),
        ]);
        let roles = select_roles(&t, &InsightConfig::default());
        assert_eq!(roles.group, Some("Country"));
        assert_eq!(roles.value, Some("Revenue"));
    }

    #[test]
    fn roles_fall_back_to_first_candidates() {
        let t = table(vec![
            ("Code", Column::categorical_from(vec![Some("a"), Some("b")])),
            ("X", Column::numeric_from(vec![Some(1.0), Some(2.0)])),
        ]);
        let roles = select_roles(&t, &InsightConfig::default());
        assert_eq!(roles.group, Some("Code"));
        assert_eq!(roles.value, Some("X"));
    }

    #[test]
    fn low_cardinality_numeric_can_group() {
        let t = table(vec![
            ("Store", Column::numeric_from(vec![Some(1.0), Some(2.0), Some(1.0)])),
            ("Weekly_Sales", Column::numeric_from(vec![Some(10.0), Some(20.0), Some(30.0)])),
        ]);
        let report = generate(&t, &InsightConfig::default());
        let top = report.top_performers.unwrap();
        assert_eq!(top.group_column, "Store");
        assert_eq!(top.value_column, "Weekly_Sales");
        assert_eq!(top.rows[0], Performer { key: "1".into(), total: 40.0 });
    }

    #[test]
    fn same_group_and_value_skips_performers() {
        let t = table(vec![("Sales", Column::numeric_from(vec![Some(1.0), Some(2.0)]))]);
        let report = generate(&t, &InsightConfig::default());
        assert!(report.top_performers.is_none());
        assert!(report.section(SectionKind::Performers).is_none());
    }

    #[test]
    fn top_and_bottom_tables() {
        let keys: Vec<Option<String>> = (0..15).map(|i| Some(format!("k{i:02}"))).collect();
        let vals: Vec<Option<f64>> = (0..15).map(|i| Some(i as f64)).collect();
        let t = table(vec![
            ("Product", Column::categorical_from(keys)),
            ("Amount", Column::numeric_from(vals)),
        ]);
        let report = generate(&t, &InsightConfig::default());
        let top = report.top_performers.unwrap();
        let bottom = report.bottom_performers.unwrap();
        assert_eq!(top.rows.len(), 10);
        assert_eq!(top.rows[0].key, "k14");
        assert_eq!(bottom.rows.len(), 10);
        assert_eq!(bottom.rows[9].key, "k00");
        assert_eq!(bottom.rows[0].key, "k09");
    }

    #[test]
    fn performer_totals_use_thousands_separators() {
        let t = table(vec![
            ("Region", Column::categorical_from(vec![Some("N"), Some("S")])),
            ("Revenue", Column::numeric_from(vec![Some(1_234_567.6), Some(-2_500.0)])),
        ]);
        let report = generate(&t, &InsightConfig::default());
        let lines = &report.section(SectionKind::Performers).unwrap().lines;
        assert_eq!(lines[0], "**Top Performer:** N with 1,234,568 total Revenue.");
        assert_eq!(lines[1], "**Bottom Performer:** S with -2,500 total Revenue.");
    }

    #[test]
    fn missing_data_narrative() {
        let t = table(vec![
            ("a", Column::numeric_from(vec![Some(1.0), None, Some(3.0)])),
            ("b", Column::categorical_from(vec![Some("x"), Some("y"), Some("z")])),
            ("c", Column::categorical_from(vec![None::<&str>, None, Some("z")])),
        ]);
        let report = generate(&t, &InsightConfig::default());
        let lines = &report.section(SectionKind::MissingData).unwrap().lines;
        assert_eq!(
            lines,
            &vec![
                "**Missing Data:** 2 columns contain missing values.".to_string(),
                "- a: 33.3% missing (1 rows)".to_string(),
                "- c: 66.7% missing (2 rows)".to_string(),
            ]
        );
    }

    #[test]
    fn missing_data_lists_at_most_configured_columns() {
        let cols: Vec<(String, Column)> = (0..7)
            .map(|i| (format!("c{i}"), Column::numeric_from(vec![None, Some(1.0)])))
            .collect();
        let t = Table::from_columns(cols).unwrap();
        let report = generate(&t, &InsightConfig::default());
        let lines = &report.section(SectionKind::MissingData).unwrap().lines;
        assert_eq!(lines[0], "**Missing Data:** 7 columns contain missing values.");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn no_missing_values() {
        let t = table(vec![("x", Column::numeric_from(vec![Some(1.0)]))]);
        let report = generate(&t, &InsightConfig::default());
        assert_eq!(
            report.section(SectionKind::MissingData).unwrap().lines,
            vec!["**Data Quality:** No missing values detected.".to_string()]
        );
    }

    #[test]
    fn single_negative_quantity_is_flagged_once() {
        let mut qty: Vec<Option<f64>> = (1..=100).map(|i| Some(i as f64)).collect();
        qty.push(Some(-5.0));
        let t = table(vec![("Quantity", Column::numeric_from(qty))]);
        let report = generate(&t, &InsightConfig::default());
        let lines = &report.section(SectionKind::Anomalies).unwrap().lines;
        assert_eq!(lines, &vec!["**Anomaly:** Quantity contains 1 negative values.".to_string()]);
    }

    #[test]
    fn outliers_flagged_beyond_three_sigma() {
        let mut v: Vec<Option<f64>> = (0..50).map(|i| Some(10.0 + (i % 3) as f64)).collect();
        v.push(Some(1000.0));
        let t = table(vec![("Score", Column::numeric_from(v))]);
        let report = generate(&t, &InsightConfig::default());
        let lines = &report.section(SectionKind::Anomalies).unwrap().lines;
        assert_eq!(
            lines,
            &vec!["**Outliers:** Score has 1 extreme values (2.0% beyond 3 standard deviations)."
                .to_string()]
        );
    }

    #[test]
    fn quiet_numeric_data() {
        let t = table(vec![("Score", Column::numeric_from(vec![Some(1.0), Some(2.0), Some(3.0)]))]);
        let report = generate(&t, &InsightConfig::default());
        assert_eq!(
            report.section(SectionKind::Anomalies).unwrap().lines,
            vec!["**No significant anomalies detected.**".to_string()]
        );
    }

    #[test]
    fn anomalies_omitted_without_numeric_columns() {
        let t = table(vec![("Label", Column::categorical_from(vec![Some("a")]))]);
        let report = generate(&t, &InsightConfig::default());
        assert_eq!(
            kinds(&report),
            vec![SectionKind::MissingData, SectionKind::Summary]
        );
    }

    #[test]
    fn custom_non_negative_vocabulary() {
        let config = InsightConfig {
            non_negative_tokens: Vocabulary::new(["stock"]),
            ..InsightConfig::default()
        };
        let t = table(vec![
            ("Stock", Column::numeric_from(vec![Some(-1.0), Some(2.0)])),
            ("Sales", Column::numeric_from(vec![Some(-1.0), Some(2.0)])),
        ]);
        let report = generate(&t, &config);
        let lines = &report.section(SectionKind::Anomalies).unwrap().lines;
        assert_eq!(lines, &vec!["**Anomaly:** Stock contains 1 negative values.".to_string()]);
    }

    #[test]
    fn temporal_section() {
        let dates = ["2024-01-03", "2024-01-01", "2024-01-03", "2024-01-02 10:00", "2024-01-01"]
            .iter()
            .map(|s| parse_datetime(s))
            .chain([None]);
        let t = table(vec![("OrderDate", Column::datetime_from(dates))]);
        let report = generate(&t, &InsightConfig::default());
        let lines = &report.section(SectionKind::Temporal).unwrap().lines;
        assert_eq!(lines[0], "**Date Range:** 2024-01-01 to 2024-01-03 (2 days).");
        // 01-01 and 01-03 tie at two records
        assert_eq!(lines[1], "**Busiest Day:** 2024-01-01 with 2 records.");
        assert_eq!(lines[2], "**Slowest Day:** 2024-01-02 with 1 records.");
    }

    #[test]
    fn temporal_omitted_when_no_dated_rows() {
        let t = table(vec![("Created", Column::datetime_from(vec![None, None]))]);
        let report = generate(&t, &InsightConfig::default());
        assert!(report.section(SectionKind::Temporal).is_none());
    }

    #[test]
    fn empty_table_has_only_summary() {
        let t = table(vec![
            ("Country", Column::categorical_from(Vec::<Option<String>>::new())),
            ("Sales", Column::numeric_from(Vec::new())),
        ]);
        let report = generate(&t, &InsightConfig::default());
        assert_eq!(kinds(&report), vec![SectionKind::Summary]);
        assert!(report.top_performers.is_none());
        let text = report.text();
        assert!(text.starts_with("**Dataset Size:** 0 rows, 2 columns."));
        assert!(text.ends_with("**Column Types:** 1 numeric, 1 categorical, 0 datetime."));
    }

    #[test]
    fn section_order_and_text() {
        let t = table(vec![
            ("Country", Column::categorical_from(vec![Some("US"), Some("FR"), Some("US")])),
            ("Sales", Column::numeric_from(vec![Some(100.0), Some(50.0), Some(200.0)])),
            ("Date", Column::datetime_from(vec![
                parse_datetime("2024-01-01"),
                parse_datetime("2024-01-02"),
                parse_datetime("2024-01-02"),
            ])),
        ]);
        let report = generate(&t, &InsightConfig::default());
        assert_eq!(
            kinds(&report),
            vec![
                SectionKind::Performers,
                SectionKind::MissingData,
                SectionKind::Anomalies,
                SectionKind::Temporal,
                SectionKind::Summary,
            ]
        );
        let text = report.text();
        assert!(text.starts_with(
            "**Top Performer:** US with 300 total Sales.\n**Bottom Performer:** FR with 50 total Sales.\n\n"
        ));
        assert_eq!(text.matches("\n\n").count(), 4);
    }
}
