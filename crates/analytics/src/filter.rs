use crate::store::RecordStore;
use core_types::{FilterSelection, Record};
use serde::Serialize;

/// The subset of a store's records that satisfies a selection, in store order.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredView<'a> {
    rows: Vec<&'a Record>,
}

impl<'a> FilteredView<'a> {
    pub fn new(rows: Vec<&'a Record>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[&'a Record] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.rows.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first `n` rows, cloned for hand-off to the view layer.
    pub fn head(&self, n: usize) -> Vec<Record> {
        self.iter().take(n).cloned().collect()
    }

    /// Materializes the view as a standalone store.
    pub fn to_store(&self) -> RecordStore {
        RecordStore::from_records(self.iter().cloned().collect())
    }
}

/// Which rows a derived table reads.
///
/// Several rankings read past the active filter on purpose; the scope makes
/// that visible at the call site instead of reaching for the store directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataScope {
    /// Every filter dimension applies.
    Filtered,
    /// Only the ticker selection applies.
    TickersOnly,
    /// The whole store, regardless of the selection.
    Full,
}

/// A stateless filter over a `RecordStore`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterEngine;

impl FilterEngine {
    /// Applies every dimension of `selection` as a logical AND: sector, then
    /// month name, then year, then ticker.
    pub fn apply<'a>(store: &'a RecordStore, selection: &FilterSelection) -> FilteredView<'a> {
        let rows: Vec<&Record> = store
            .records()
            .iter()
            .filter(|r| match r.sector() {
                Some(sector) => selection.sectors.contains_str(sector),
                None => selection.sectors.is_all(),
            })
            .filter(|r| selection.month.as_deref().is_none_or(|m| r.month_name() == m))
            .filter(|r| selection.year.is_none_or(|y| r.year() == y))
            .filter(|r| selection.tickers.contains_str(r.ticker()))
            .collect();

        tracing::debug!(
            store_rows = store.len(),
            view_rows = rows.len(),
            "Filter applied."
        );
        FilteredView::new(rows)
    }

    /// Narrows the store by ticker only, ignoring sector, month and year.
    pub fn narrow_tickers<'a>(store: &'a RecordStore, selection: &FilterSelection) -> FilteredView<'a> {
        let tickers_only = FilterSelection {
            tickers: selection.tickers.clone(),
            ..FilterSelection::all()
        };
        Self::apply(store, &tickers_only)
    }

    /// Resolves the rows a table with the given scope should read.
    pub fn scoped<'a>(
        store: &'a RecordStore,
        selection: &FilterSelection,
        scope: DataScope,
    ) -> FilteredView<'a> {
        match scope {
            DataScope::Filtered => Self::apply(store, selection),
            DataScope::TickersOnly => Self::narrow_tickers(store, selection),
            DataScope::Full => store.view(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    const SECTORS: [&str; 3] = ["Tech", "Energy", "Banking"];
    const TICKERS: [&str; 5] = ["INFY", "ONGC", "HDFC", "TCS", "SBIN"];

    #[fixture]
    fn twenty_rows() -> RecordStore {
        build_store()
    }

    /// 20 rows over 3 sectors: 8 Tech, 7 Energy, 5 Banking.
    fn build_store() -> RecordStore {
        let layout = [
            ("INFY", "Tech", 2023, 12, 29),
            ("INFY", "Tech", 2024, 1, 2),
            ("INFY", "Tech", 2024, 3, 1),
            ("INFY", "Tech", 2024, 3, 4),
            ("TCS", "Tech", 2023, 3, 15),
            ("TCS", "Tech", 2024, 1, 2),
            ("TCS", "Tech", 2024, 3, 1),
            ("TCS", "Tech", 2024, 3, 4),
            ("ONGC", "Energy", 2023, 12, 29),
            ("ONGC", "Energy", 2024, 1, 2),
            ("ONGC", "Energy", 2024, 3, 1),
            ("ONGC", "Energy", 2024, 3, 4),
            ("RELI", "Energy", 2023, 3, 15),
            ("RELI", "Energy", 2024, 1, 2),
            ("RELI", "Energy", 2024, 3, 1),
            ("HDFC", "Banking", 2023, 12, 29),
            ("HDFC", "Banking", 2024, 1, 2),
            ("HDFC", "Banking", 2024, 3, 1),
            ("SBIN", "Banking", 2023, 3, 15),
            ("SBIN", "Banking", 2024, 3, 1),
        ];

        RecordStore::from_records(
            layout
                .iter()
                .map(|&(ticker, sector, y, m, d)| {
                    Record::new(ticker, NaiveDate::from_ymd_opt(y, m, d).unwrap()).with_sector(sector)
                })
                .collect(),
        )
    }

    #[rstest]
    #[case("Tech", 8)]
    #[case("Energy", 7)]
    #[case("Banking", 5)]
    fn sector_filter_keeps_exactly_that_sector(
        twenty_rows: RecordStore,
        #[case] sector: &str,
        #[case] expected: usize,
    ) {
        let view = FilterEngine::apply(&twenty_rows, &FilterSelection::all().with_sectors([sector]));
        assert_eq!(view.len(), expected);
        assert!(view.iter().all(|r| r.sector() == Some(sector)));
    }

    #[rstest]
    fn dimensions_combine_as_and(twenty_rows: RecordStore) {
        let selection = FilterSelection::all()
            .with_sectors(["Tech", "Energy"])
            .with_month("March")
            .with_year(2024)
            .with_tickers(["TCS", "RELI", "HDFC"]);

        let view = FilterEngine::apply(&twenty_rows, &selection);
        let picked: Vec<(&str, NaiveDate)> = view.iter().map(|r| (r.ticker(), r.date())).collect();
        assert_eq!(
            picked,
            vec![
                ("TCS", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
                ("TCS", NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()),
                ("RELI", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            ]
        );
    }

    #[rstest]
    fn month_matches_across_years(twenty_rows: RecordStore) {
        let view = FilterEngine::apply(&twenty_rows, &FilterSelection::all().with_month("March"));
        assert_eq!(view.len(), 12);
        assert!(view.iter().any(|r| r.year() == 2023));
    }

    #[rstest]
    fn unknown_values_produce_an_empty_view(twenty_rows: RecordStore) {
        let view = FilterEngine::apply(&twenty_rows, &FilterSelection::all().with_year(1999));
        assert!(view.is_empty());
        assert!(view.to_store().is_empty());
    }

    #[test]
    fn sector_filter_drops_rows_without_sector() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let store = RecordStore::from_records(vec![
            Record::new("A", date),
            Record::new("B", date).with_sector("Tech"),
        ]);

        assert_eq!(FilterEngine::apply(&store, &FilterSelection::all()).len(), 2);
        assert_eq!(
            FilterEngine::apply(&store, &FilterSelection::all().with_sectors(["Tech"])).len(),
            1
        );
    }

    #[rstest]
    fn scopes_read_past_the_filter(twenty_rows: RecordStore) {
        let selection = FilterSelection::all().with_tickers(["SBIN"]).with_year(2024);

        assert_eq!(FilterEngine::scoped(&twenty_rows, &selection, DataScope::Filtered).len(), 1);
        assert_eq!(FilterEngine::scoped(&twenty_rows, &selection, DataScope::TickersOnly).len(), 2);
        assert_eq!(FilterEngine::scoped(&twenty_rows, &selection, DataScope::Full).len(), 20);
    }

    fn arb_selection() -> impl Strategy<Value = FilterSelection> {
        (
            proptest::sample::subsequence(TICKERS.to_vec(), 0..=TICKERS.len()),
            proptest::sample::subsequence(SECTORS.to_vec(), 0..=SECTORS.len()),
            proptest::option::of(prop_oneof![Just("January"), Just("March"), Just("December")]),
            proptest::option::of(2023i32..=2024),
        )
            .prop_map(|(tickers, sectors, month, year)| FilterSelection {
                tickers: core_types::Selection::only(tickers.into_iter().map(String::from)),
                sectors: core_types::Selection::only(sectors.into_iter().map(String::from)),
                month: month.map(String::from),
                year,
            })
    }

    proptest! {
        #[test]
        fn prop_view_is_a_subset_satisfying_every_predicate(selection in arb_selection()) {
            let store = build_store();
            let view = FilterEngine::apply(&store, &selection);

            for row in view.iter() {
                prop_assert!(store.records().contains(row));
                prop_assert!(selection.tickers.contains_str(row.ticker()));
                prop_assert!(row.sector().is_some_and(|s| selection.sectors.contains_str(s)));
                prop_assert!(selection.month.as_deref().is_none_or(|m| m == row.month_name()));
                prop_assert!(selection.year.is_none_or(|y| y == row.year()));
            }

            let expected = store
                .records()
                .iter()
                .filter(|r| {
                    selection.tickers.contains_str(r.ticker())
                        && r.sector().is_some_and(|s| selection.sectors.contains_str(s))
                        && selection.month.as_deref().is_none_or(|m| m == r.month_name())
                        && selection.year.is_none_or(|y| y == r.year())
                })
                .count();
            prop_assert_eq!(view.len(), expected);
        }

        #[test]
        fn prop_filtering_is_idempotent(selection in arb_selection()) {
            let store = build_store();
            let once = FilterEngine::apply(&store, &selection).to_store();
            let twice = FilterEngine::apply(&once, &selection).to_store();
            prop_assert_eq!(once, twice);
        }
    }

    #[rstest]
    fn unrestricted_selection_is_identity(twenty_rows: RecordStore) {
        let view = FilterEngine::apply(&twenty_rows, &FilterSelection::all());
        assert_eq!(view.to_store(), twenty_rows);
    }
}
