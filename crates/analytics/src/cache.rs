use crate::error::AnalyticsError;
use crate::report::DashboardReport;
use crate::store::RecordStore;
use core_types::{FilterSelection, RawRow};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identifies one state of the data source (a row count plus last date, a file
/// modification stamp, ...). A new version means the store must be reloaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceVersion(String);

impl SourceVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holds the store for the current source version. Loading happens only when
/// the version changes or after an explicit `invalidate`.
#[derive(Debug, Default)]
pub struct StoreCache {
    current: Option<(SourceVersion, Arc<RecordStore>)>,
}

impl StoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> Option<&SourceVersion> {
        self.current.as_ref().map(|(version, _)| version)
    }

    pub fn is_current(&self, version: &SourceVersion) -> bool {
        self.version() == Some(version)
    }

    pub fn store(&self) -> Option<Arc<RecordStore>> {
        self.current.as_ref().map(|(_, store)| Arc::clone(store))
    }

    /// Replaces the cached store with one built from `rows`. A schema error
    /// leaves the cache empty: a stale store is never served for a new version.
    pub fn install(
        &mut self,
        version: SourceVersion,
        rows: &[RawRow],
    ) -> Result<Arc<RecordStore>, AnalyticsError> {
        self.current = None;
        let store = Arc::new(RecordStore::load(rows)?);
        tracing::info!(%version, rows = store.len(), "Record store cached.");
        self.current = Some((version, Arc::clone(&store)));
        Ok(store)
    }

    pub fn invalidate(&mut self) {
        if let Some((version, _)) = self.current.take() {
            tracing::debug!(%version, "Record store cache invalidated.");
        }
    }
}

/// Derived tables keyed by `(source version, selection)`.
///
/// Entries for an older version are dropped as soon as a different version is
/// requested, so a reload never serves tables computed from the previous store.
#[derive(Debug, Default)]
pub struct ReportCache {
    version: Option<SourceVersion>,
    reports: HashMap<FilterSelection, Arc<DashboardReport>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Computes each distinct key at most once.
    pub fn get_or_compute<F>(
        &mut self,
        version: &SourceVersion,
        selection: &FilterSelection,
        compute: F,
    ) -> Arc<DashboardReport>
    where
        F: FnOnce() -> DashboardReport,
    {
        if self.version.as_ref() != Some(version) {
            self.invalidate();
            self.version = Some(version.clone());
        }

        if let Some(report) = self.reports.get(selection) {
            tracing::debug!("Derived tables served from cache.");
            return Arc::clone(report);
        }

        let report = Arc::new(compute());
        self.reports.insert(selection.clone(), Arc::clone(&report));
        report
    }

    pub fn invalidate(&mut self) {
        self.reports.clear();
        self.version = None;
    }
}
