use crate::cache::{ReportCache, SourceVersion, StoreCache};
use crate::engine::AggregationEngine;
use crate::error::AnalyticsError;
use crate::report::DashboardReport;
use crate::store::FilterOptions;
use core_types::{FilterSelection, RawRow};
use std::sync::Arc;

/// Ties the caches to the engine: one store per source version, one set of
/// derived tables per `(version, selection)`.
#[derive(Debug, Default)]
pub struct Dashboard {
    engine: AggregationEngine,
    stores: StoreCache,
    reports: ReportCache,
}

impl Dashboard {
    pub fn new(engine: AggregationEngine) -> Self {
        Self {
            engine,
            stores: StoreCache::new(),
            reports: ReportCache::new(),
        }
    }

    pub fn is_current(&self, version: &SourceVersion) -> bool {
        self.stores.is_current(version)
    }

    /// Installs rows fetched for `version`, dropping every cached table.
    pub fn install(&mut self, version: SourceVersion, rows: &[RawRow]) -> Result<(), AnalyticsError> {
        self.reports.invalidate();
        self.stores.install(version, rows)?;
        Ok(())
    }

    pub fn invalidate(&mut self) {
        self.stores.invalidate();
        self.reports.invalidate();
    }

    /// The selectable filter values. They come from the whole store, so they
    /// never shrink as filters are applied.
    pub fn options(&self) -> Result<FilterOptions, AnalyticsError> {
        let store = self.stores.store().ok_or(AnalyticsError::NotLoaded)?;
        Ok(store.filter_options())
    }

    pub fn render(&mut self, selection: &FilterSelection) -> Result<Arc<DashboardReport>, AnalyticsError> {
        let version = self.stores.version().cloned().ok_or(AnalyticsError::NotLoaded)?;
        let store = self.stores.store().ok_or(AnalyticsError::NotLoaded)?;
        let engine = &self.engine;

        Ok(self
            .reports
            .get_or_compute(&version, selection, || engine.aggregate(&store, selection)))
    }
}
