//! Rule tables and thresholds for the heuristic engines.
//!
//! Every keyword heuristic in the crate (which column looks like a date,
//! which one is the value to rank by, which one names a group) is driven
//! by an ordered [`Vocabulary`] held here rather than by inline string
//! checks. Defaults reproduce the stock dashboard behaviour; a TOML
//! document can override any subset of fields.
//!
//! ```
//! use u_bizlens::config::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     [insight]
//!     top_n = 5
//!     value_tokens = ["units"]
//! "#).unwrap();
//!
//! assert_eq!(config.insight.top_n, 5);
//! assert!(config.insight.value_tokens.matches("Units Sold"));
//! // untouched sections keep their defaults
//! assert!(config.inference.date_tokens.matches("created_at"));
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ── Vocabulary ────────────────────────────────────────────────────────

/// Ordered list of lowercase tokens matched as substrings of a column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary(Vec<String>);

impl From<Vec<String>> for Vocabulary {
    fn from(tokens: Vec<String>) -> Self {
        Self::new(tokens)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(v: Vocabulary) -> Self {
        v.0
    }
}

impl Vocabulary {
    /// Builds a vocabulary; tokens are lowercased.
    pub fn new<S: AsRef<str>, I: IntoIterator<Item = S>>(tokens: I) -> Self {
        Self(
            tokens
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        )
    }

    /// Returns `true` if the lowercase `name` contains any token.
    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.0.iter().any(|t| lower.contains(t.as_str()))
    }

    /// Returns the tokens in order.
    pub fn tokens(&self) -> &[String] {
        &self.0
    }
}

// ── InferenceConfig ───────────────────────────────────────────────────

/// Settings for [`infer`](crate::inference::infer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Name tokens that make a column a date candidate.
    pub date_tokens: Vocabulary,
    /// Success fraction a date parse must strictly exceed. Default: 0.5.
    pub date_threshold: f64,
    /// Success fraction a numeric parse must strictly exceed. Default: 0.5.
    pub numeric_threshold: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            date_tokens: Vocabulary::new(["date", "time", "created", "updated", "timestamp"]),
            date_threshold: 0.5,
            numeric_threshold: 0.5,
        }
    }
}

// ── InsightConfig ─────────────────────────────────────────────────────

/// Settings for [`generate`](crate::insights::generate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Preferred grouping-column tokens, in priority order.
    pub group_tokens: Vocabulary,
    /// Preferred value-column tokens, in priority order.
    pub value_tokens: Vocabulary,
    /// Tokens marking quantities that should never be negative.
    pub non_negative_tokens: Vocabulary,
    /// Numeric columns with fewer distinct values also act as groups. Default: 100.
    pub low_cardinality_limit: usize,
    /// Groups kept in each performer table. Default: 10.
    pub top_n: usize,
    /// Columns listed in the missing-data narrative. Default: 5.
    pub max_missing_columns: usize,
    /// Leading numeric columns scanned for anomalies. Default: 5.
    pub max_anomaly_columns: usize,
    /// Standard deviations beyond which a value is an outlier. Default: 3.0.
    pub outlier_sigma: f64,
    /// Outliers are reported only below this share of rows. Default: 0.1.
    pub outlier_max_fraction: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            group_tokens: Vocabulary::new([
                "country",
                "product",
                "category",
                "customer",
                "description",
                "name",
                "store",
                "region",
                "city",
                "state",
                "department",
            ]),
            value_tokens: Vocabulary::new([
                "quantity", "amount", "sales", "revenue", "price", "total", "weekly", "monthly",
                "cost", "profit", "value",
            ]),
            non_negative_tokens: Vocabulary::new(["quantity", "amount", "price", "sales"]),
            low_cardinality_limit: 100,
            top_n: 10,
            max_missing_columns: 5,
            max_anomaly_columns: 5,
            outlier_sigma: 3.0,
            outlier_max_fraction: 0.1,
        }
    }
}

// ── ChartConfig ───────────────────────────────────────────────────────

/// Settings for the chart data helpers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Tokens marking identifier-like numeric columns, excluded from
    /// distribution charts.
    pub id_tokens: Vocabulary,
    /// Bars kept in a category chart. Default: 20.
    pub top_categories: usize,
    /// Points kept in a scatter chart. Default: 5000.
    pub max_scatter_points: usize,
    /// Histogram bins. Default: 50.
    pub histogram_bins: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            id_tokens: Vocabulary::new(["id", "invoice", "code", "number", "no", "num"]),
            top_categories: 20,
            max_scatter_points: 5000,
            histogram_bins: 50,
        }
    }
}

// ── EngineConfig ──────────────────────────────────────────────────────

/// Complete configuration for a [`Session`](crate::session::Session).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub inference: InferenceConfig,
    pub insight: InsightConfig,
    pub chart: ChartConfig,
}

impl EngineConfig {
    /// Parses a TOML document; absent fields keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Reads and parses a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
