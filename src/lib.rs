//! # u-bizlens
//!
//! Analytics core for tabular business data, with C FFI bindings.
//!
//! A raw table (every column still text) goes through type inference and
//! then feeds three independent engines:
//!
//! ```text
//! raw table ──> inference ──> typed table ──┬─> profiling
//!                                           ├─> filter
//!                                           └─> insights
//! ```
//!
//! No engine mutates the table it is given; each returns new values.
//!
//! ## Modules
//!
//! - [`table`]: column-major data model (Table, Column, ColumnKind, validity bitmap)
//! - [`csv_reader`]: CSV text into a raw, all-text table
//! - [`inference`]: Numeric / Datetime / Categorical classification and coercion
//! - [`profiling`]: numeric and categorical summaries, missing counts, Pearson correlation
//! - [`filter`]: categorical, numeric and date-range row filtering
//! - [`insights`]: top/bottom performers, missing data, anomalies, date trends, dataset summary
//! - [`grouping`]: group-by/aggregate kernel
//! - [`chart_data`]: time series, category bars, histogram and scatter data
//! - [`stats`]: descriptive statistic kernels
//! - [`config`]: keyword vocabularies and thresholds, loadable from TOML
//! - [`session`]: caller-owned holder of the current dataset
//! - [`format`]: number formatting for narrative text
//! - [`ffi`]: C FFI bindings returning JSON (header generated by cbindgen)
//! - [`error`]: error types
//!
//! ## Quick Start
//!
//! ```
//! use u_bizlens::session::Session;
//! use u_bizlens::table::ColumnKind;
//!
//! let csv = "InvoiceDate,Country,Quantity\n\
//!            01/12/2023,United Kingdom,6\n\
//!            01/12/2023,France,24\n\
//!            02/12/2023,United Kingdom,12\n";
//!
//! let mut session = Session::default();
//! let table = session.load_csv(csv).unwrap();
//! assert_eq!(table.schema()[0].1, ColumnKind::Datetime);
//! assert_eq!(table.schema()[2].1, ColumnKind::Numeric);
//!
//! let report = session.insights().unwrap();
//! let top = report.top_performers.as_ref().unwrap();
//! assert_eq!(top.rows[0].key, "France");
//! println!("{}", report.text());
//! ```

pub mod chart_data;
pub mod config;
pub mod csv_reader;
pub mod error;
pub mod ffi;
pub mod filter;
pub mod format;
pub mod grouping;
pub mod inference;
pub mod insights;
pub mod profiling;
pub mod session;
pub mod stats;
pub mod table;
