use crate::filter::FilteredView;
use core_types::{RawRow, Record, SchemaError};
use serde::Serialize;
use std::collections::HashSet;

/// The in-memory, read-only table of daily records for one load cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<Record>,
}

/// The selectable values of every filter dimension, taken from the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub tickers: Vec<String>,
    pub sectors: Vec<String>,
    pub months: Vec<String>,
    pub years: Vec<i32>,
}

impl RecordStore {
    /// Parses every raw row. The first malformed row aborts the load and no
    /// store is produced.
    pub fn load(rows: &[RawRow]) -> Result<Self, SchemaError> {
        let records = rows
            .iter()
            .enumerate()
            .map(|(index, row)| Record::from_raw(index, row))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(rows = records.len(), "Record store loaded.");
        Ok(Self { records })
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A view over every record, in load order.
    pub fn view(&self) -> FilteredView<'_> {
        FilteredView::new(self.records.iter().collect())
    }

    pub fn all_tickers(&self) -> Vec<&str> {
        first_seen(self.records.iter().map(Record::ticker))
    }

    /// Rows without a sector do not contribute an option.
    pub fn all_sectors(&self) -> Vec<&str> {
        first_seen(self.records.iter().filter_map(Record::sector))
    }

    pub fn all_month_names(&self) -> Vec<&'static str> {
        first_seen(self.records.iter().map(Record::month_name))
    }

    pub fn all_years(&self) -> Vec<i32> {
        first_seen(self.records.iter().map(Record::year))
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            tickers: self.all_tickers().into_iter().map(str::to_string).collect(),
            sectors: self.all_sectors().into_iter().map(str::to_string).collect(),
            months: self.all_month_names().into_iter().map(str::to_string).collect(),
            years: self.all_years(),
        }
    }
}

fn first_seen<T, I>(values: I) -> Vec<T>
where
    T: Copy + Eq + std::hash::Hash,
    I: Iterator<Item = T>,
{
    let mut seen = HashSet::new();
    values.filter(|value| seen.insert(*value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: serde_json::Value) -> Vec<RawRow> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn load_keeps_row_order_and_derives_options() {
        let store = RecordStore::load(&rows(json!([
            {"Ticker": "B", "date": "2024-02-01", "sector": "Energy"},
            {"Ticker": "A", "date": "2023-12-29", "sector": null},
            {"Ticker": "B", "date": "2024-02-02", "sector": "Energy"},
            {"Ticker": "C", "date": "2024-03-01", "sector": "Banking"},
        ])))
        .unwrap();

        assert_eq!(store.len(), 4);
        assert_eq!(store.all_tickers(), vec!["B", "A", "C"]);
        assert_eq!(store.all_sectors(), vec!["Energy", "Banking"]);
        assert_eq!(store.all_month_names(), vec!["February", "December", "March"]);
        assert_eq!(store.all_years(), vec![2024, 2023]);
    }

    #[test]
    fn one_bad_row_fails_the_whole_load() {
        let err = RecordStore::load(&rows(json!([
            {"Ticker": "A", "date": "2024-01-01"},
            {"Ticker": "B", "date": "not-a-date"},
        ])))
        .unwrap_err();

        assert_eq!(
            err,
            SchemaError::InvalidDate { row: 1, value: "not-a-date".to_string() }
        );
    }

    #[test]
    fn empty_input_is_an_empty_store() {
        let store = RecordStore::load(&[]).unwrap();
        assert!(store.is_empty());
        assert!(store.view().is_empty());
        assert_eq!(store.filter_options(), FilterOptions::default());
    }
}
