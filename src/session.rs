//! Caller-owned analysis session.
//!
//! A [`Session`] holds the current dataset and the engine configuration.
//! Loading or adopting a table replaces the current one wholesale; the
//! table itself is shared through an [`Arc`] and never edited.
//!
//! ```
//! use u_bizlens::filter::FilterSpec;
//! use u_bizlens::session::Session;
//!
//! let mut session = Session::default();
//! session.load_csv("Region,Sales\nN,10\nS,20\nN,5\n").unwrap();
//!
//! let outcome = session.filter(&FilterSpec::new().with_categories("Region", ["N"])).unwrap();
//! assert_eq!(outcome.matched, 2);
//! session.adopt(outcome);
//! assert_eq!(session.current().unwrap().row_count(), 2);
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::chart_data::{self, CategoryBar, HistogramBin, ScatterPoint, SeriesPoint};
use crate::config::EngineConfig;
use crate::csv_reader::CsvReader;
use crate::error::{Error, Result};
use crate::filter::{self, FilterOutcome, FilterSpec};
use crate::grouping::Aggregation;
use crate::inference;
use crate::insights::{self, InsightReport};
use crate::profiling::{self, DatasetInfo, ProfileReport};
use crate::table::Table;

/// Current dataset plus configuration.
#[derive(Debug, Clone, Default)]
pub struct Session {
    config: EngineConfig,
    current: Option<Arc<Table>>,
}

impl Session {
    /// Creates an empty session with `config`.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            current: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Infers column kinds of `raw` and makes the result current.
    pub fn load(&mut self, raw: &Table) -> Arc<Table> {
        let typed = Arc::new(inference::infer(raw, &self.config.inference));
        debug!(
            rows = typed.row_count(),
            columns = typed.column_count(),
            "loaded dataset"
        );
        self.current = Some(Arc::clone(&typed));
        typed
    }

    /// Reads CSV text with default reader settings, then [`load`](Self::load)s it.
    pub fn load_csv(&mut self, csv: &str) -> Result<Arc<Table>> {
        let raw = CsvReader::new().parse_str(csv)?;
        Ok(self.load(&raw))
    }

    /// Returns `true` if a dataset is loaded.
    pub fn has_dataset(&self) -> bool {
        self.current.is_some()
    }

    /// The current dataset.
    ///
    /// # Errors
    ///
    /// [`Error::NoDataset`] if nothing has been loaded.
    pub fn current(&self) -> Result<Arc<Table>> {
        self.current.clone().ok_or(Error::NoDataset)
    }

    fn table(&self) -> Result<&Table> {
        self.current.as_deref().ok_or(Error::NoDataset)
    }

    /// Profiles the current dataset.
    pub fn profile(&self) -> Result<ProfileReport> {
        Ok(profiling::profile(self.table()?))
    }

    /// Shape and schema of the current dataset.
    pub fn info(&self) -> Result<DatasetInfo> {
        Ok(profiling::dataset_info(self.table()?))
    }

    /// Filters the current dataset without replacing it.
    pub fn filter(&self, spec: &FilterSpec) -> Result<FilterOutcome> {
        Ok(filter::apply(self.table()?, spec))
    }

    /// Makes a filtered table current.
    pub fn adopt(&mut self, outcome: FilterOutcome) -> Arc<Table> {
        let table = Arc::new(outcome.table);
        self.current = Some(Arc::clone(&table));
        table
    }

    /// Generates insights for the current dataset.
    pub fn insights(&self) -> Result<InsightReport> {
        Ok(insights::generate(self.table()?, &self.config.insight))
    }

    /// Daily series of `value` over `date`.
    pub fn time_series(&self, date: &str, value: &str, agg: Aggregation) -> Result<Vec<SeriesPoint>> {
        chart_data::time_series(self.table()?, date, value, agg)
    }

    /// Category bars, keeping the configured number of categories.
    pub fn category_bars(
        &self,
        category: &str,
        value: &str,
        agg: Aggregation,
    ) -> Result<Vec<CategoryBar>> {
        let top_n = self.config.chart.top_categories;
        chart_data::category_bars(self.table()?, category, value, agg, top_n)
    }

    /// Histogram with the configured bin count.
    pub fn histogram(&self, column: &str) -> Result<Vec<HistogramBin>> {
        chart_data::histogram(self.table()?, column, self.config.chart.histogram_bins)
    }

    /// Scatter points, capped at the configured maximum.
    pub fn scatter(&self, x: &str, y: &str) -> Result<Vec<ScatterPoint>> {
        chart_data::scatter(self.table()?, x, y, self.config.chart.max_scatter_points)
    }

    /// Numeric columns suited to distribution charts.
    pub fn distribution_columns(&self) -> Result<Vec<String>> {
        let table = self.table()?;
        Ok(chart_data::numeric_columns_for_distribution(table, &self.config.chart)
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Drops the current dataset.
    pub fn clear(&mut self) {
        self.current = None;
    }
}
