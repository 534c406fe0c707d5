//! # Stock Dashboard Analytics Engine
//!
//! This crate turns a table of daily stock records and a filter selection into
//! the derived tables a dashboard draws: volatility leaders, sector returns,
//! close-price correlations, cumulative-return leaders, yearly best/worst and
//! monthly gainers/losers.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** no I/O. Rows come in from a row source, tables go out to a
//!   view layer.
//! - **Stateless calculation:** `FilterEngine` and `AggregationEngine` are pure
//!   functions of their inputs. Empty or under-populated inputs produce empty
//!   tables, never errors.
//! - **Explicit scopes:** tables that read past the active filter declare it
//!   through `DataScope`.
//!
//! ## Public API
//!
//! - `RecordStore`: the immutable, in-memory table for one load cycle.
//! - `FilterEngine` / `FilteredView`: selection of the rows for a view.
//! - `AggregationEngine`: the table calculations and `aggregate` for all of them.
//! - `StoreCache`, `ReportCache`, `Dashboard`: version-keyed caching.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod cache;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod filter;
pub mod report;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use cache::{ReportCache, SourceVersion, StoreCache};
pub use dashboard::Dashboard;
pub use engine::{AggregationEngine, DerivedTable};
pub use error::AnalyticsError;
pub use filter::{DataScope, FilterEngine, FilteredView};
pub use report::{
    CorrelationMatrix, CumulativeReturns, DashboardReport, MonthlyMovers, RankedTicker,
    SectorReturn, SeriesPoint, VolatilityEntry, YearlyPerformers,
};
pub use store::{FilterOptions, RecordStore};
