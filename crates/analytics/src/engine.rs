use crate::filter::{DataScope, FilterEngine, FilteredView};
use crate::report::{
    CorrelationMatrix, CumulativeReturns, DashboardReport, MonthlyMovers, RankedTicker,
    SectorReturn, SeriesPoint, VolatilityEntry, YearlyPerformers,
};
use crate::store::RecordStore;
use chrono::NaiveDate;
use configuration::RankingLimits;
use core_types::{FilterSelection, Record};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// The named tables the engine derives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedTable {
    Preview,
    Volatility,
    SectorReturns,
    Correlation,
    Cumulative,
    Yearly,
    MonthlyMovers,
}

impl DerivedTable {
    /// The rows each table reads. Cumulative, yearly and monthly rankings
    /// ignore (part of) the active filter.
    pub fn scope(self) -> DataScope {
        match self {
            DerivedTable::Preview
            | DerivedTable::Volatility
            | DerivedTable::SectorReturns
            | DerivedTable::Correlation => DataScope::Filtered,
            DerivedTable::Cumulative => DataScope::TickersOnly,
            DerivedTable::Yearly | DerivedTable::MonthlyMovers => DataScope::Full,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Descending,
    Ascending,
}

/// A stateless calculator that turns row sets into the dashboard's derived tables.
///
/// Every operation is a pure function of its input rows. Absent values are
/// ignored, and a table with nothing to show comes back empty rather than as
/// an error.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    limits: RankingLimits,
}

impl AggregationEngine {
    pub fn new(limits: RankingLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RankingLimits {
        &self.limits
    }

    /// Builds every derived table for `selection`, each from its own scope.
    pub fn aggregate(&self, store: &RecordStore, selection: &FilterSelection) -> DashboardReport {
        let filtered = FilterEngine::scoped(store, selection, DataScope::Filtered);
        let tickers_only = FilterEngine::scoped(store, selection, DataScope::TickersOnly);
        let full = FilterEngine::scoped(store, selection, DataScope::Full);
        let rows_for = |table: DerivedTable| match table.scope() {
            DataScope::Filtered => &filtered,
            DataScope::TickersOnly => &tickers_only,
            DataScope::Full => &full,
        };

        let monthly_movers = selection
            .month
            .as_deref()
            .and_then(|month| self.monthly_movers(rows_for(DerivedTable::MonthlyMovers), month));

        let report = DashboardReport {
            selection: selection.clone(),
            filtered_rows: filtered.len(),
            preview: rows_for(DerivedTable::Preview).head(self.limits.preview_rows),
            volatility: self.volatility_ranking(rows_for(DerivedTable::Volatility)),
            sector_returns: self.sector_mean_return(rows_for(DerivedTable::SectorReturns)),
            correlation: self.correlation_matrix(rows_for(DerivedTable::Correlation)),
            cumulative: self.cumulative_leaders(rows_for(DerivedTable::Cumulative)),
            yearly: self.yearly_performers(rows_for(DerivedTable::Yearly)),
            monthly_movers,
        };

        tracing::info!(
            filtered_rows = report.filtered_rows,
            volatility = report.volatility.len(),
            sectors = report.sector_returns.len(),
            correlated_tickers = report.correlation.tickers.len(),
            cumulative_leaders = report.cumulative.leaders.len(),
            yearly = report.yearly.best.len(),
            monthly = report.monthly_movers.is_some(),
            "Dashboard tables derived."
        );
        report
    }

    /// Mean volatility per ticker, highest first.
    pub fn volatility_ranking(&self, view: &FilteredView<'_>) -> Vec<VolatilityEntry> {
        let entries: Vec<VolatilityEntry> = mean_by(view, |r| Some(r.ticker()), Record::volatility)
            .into_iter()
            .map(|(ticker, (mean, observations))| VolatilityEntry {
                ticker: ticker.to_string(),
                mean_volatility: mean,
                observations,
            })
            .collect();

        top_n(entries, self.limits.volatility_top, Direction::Descending, |e| {
            e.mean_volatility
        })
    }

    /// Mean yearly return per sector, in sector name order. Rows without a
    /// sector are dropped.
    pub fn sector_mean_return(&self, view: &FilteredView<'_>) -> Vec<SectorReturn> {
        mean_by(view, Record::sector, Record::yearly_return)
            .into_iter()
            .map(|(sector, (mean, observations))| SectorReturn {
                sector: sector.to_string(),
                mean_yearly_return: mean,
                observations,
            })
            .collect()
    }

    /// Pearson correlation of close prices between every pair of tickers in
    /// the view, over the dates both tickers have.
    pub fn correlation_matrix(&self, view: &FilteredView<'_>) -> CorrelationMatrix {
        let mut prices: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        let mut any_close = false;
        let mut duplicates = 0usize;

        for record in view.iter() {
            let series = prices.entry(record.ticker()).or_default();
            if let Some(close) = record.close() {
                any_close = true;
                match series.entry(record.date()) {
                    Entry::Vacant(slot) => {
                        slot.insert(close);
                    }
                    Entry::Occupied(_) => duplicates += 1,
                }
            }
        }

        if !any_close {
            tracing::debug!("No close prices in view, correlation skipped.");
            return CorrelationMatrix::default();
        }
        if duplicates > 0 {
            tracing::warn!(duplicates, "Duplicate (ticker, date) close prices, keeping the first.");
        }

        let tickers: Vec<String> = prices.keys().map(|t| t.to_string()).collect();
        let columns: Vec<&BTreeMap<NaiveDate, f64>> = prices.values().collect();
        let n = columns.len();
        let mut values = vec![vec![None; n]; n];

        for i in 0..n {
            values[i][i] = pearson(columns[i], columns[i]).map(|_| 1.0);
            for j in (i + 1)..n {
                let r = pearson(columns[i], columns[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        CorrelationMatrix { tickers, values }
    }

    /// Ranks tickers by their latest cumulative return and returns the full
    /// series of the leaders.
    pub fn cumulative_leaders(&self, view: &FilteredView<'_>) -> CumulativeReturns {
        let mut latest: BTreeMap<&str, &Record> = BTreeMap::new();
        for record in view.iter().filter(|r| r.cumulative_return().is_some()) {
            latest
                .entry(record.ticker())
                .and_modify(|current| {
                    // Same-date duplicates: the later row wins.
                    if record.date() >= current.date() {
                        *current = record;
                    }
                })
                .or_insert(record);
        }

        let candidates: Vec<RankedTicker> = latest
            .values()
            .filter_map(|r| r.cumulative_return().map(|v| RankedTicker::from_record(r, v)))
            .collect();
        let leaders = top_n(candidates, self.limits.cumulative_top, Direction::Descending, |t| {
            t.value
        });

        let rank: HashMap<&str, usize> = leaders
            .iter()
            .enumerate()
            .map(|(i, leader)| (leader.ticker.as_str(), i))
            .collect();

        let mut series: Vec<(usize, SeriesPoint)> = view
            .iter()
            .filter_map(|r| {
                let position = *rank.get(r.ticker())?;
                let cumulative_return = r.cumulative_return()?;
                Some((
                    position,
                    SeriesPoint {
                        ticker: r.ticker().to_string(),
                        date: r.date(),
                        cumulative_return,
                    },
                ))
            })
            .collect();
        series.sort_by_key(|(position, point)| (*position, point.date));

        CumulativeReturns {
            series: series.into_iter().map(|(_, point)| point).collect(),
            leaders,
        }
    }

    /// Best and worst tickers by yearly return, one representative row each.
    pub fn yearly_performers(&self, view: &FilteredView<'_>) -> YearlyPerformers {
        let candidates = representatives(view.iter(), Record::yearly_return);
        let limit = self.limits.yearly_top;

        YearlyPerformers {
            best: top_n(candidates.clone(), limit, Direction::Descending, |t| t.value),
            worst: top_n(candidates, limit, Direction::Ascending, |t| t.value),
        }
    }

    /// Top gainers and losers by monthly return within one month name, across
    /// every year in the view. `None` when too few tickers qualify.
    pub fn monthly_movers(&self, view: &FilteredView<'_>, month: &str) -> Option<MonthlyMovers> {
        let candidates = representatives(
            view.iter().filter(|r| r.month_name() == month),
            Record::monthly_return,
        );

        if candidates.len() < self.limits.monthly_min_tickers {
            tracing::debug!(
                month,
                tickers = candidates.len(),
                required = self.limits.monthly_min_tickers,
                "Too few tickers for monthly movers."
            );
            return None;
        }

        let limit = self.limits.monthly_top;
        Some(MonthlyMovers {
            month: month.to_string(),
            gainers: top_n(candidates.clone(), limit, Direction::Descending, |t| t.value),
            losers: top_n(candidates, limit, Direction::Ascending, |t| t.value),
        })
    }
}

/// Mean of `value` per `key`, keyed in ascending order. Rows without a key
/// are dropped; keys whose rows all lack the value, or whose sum overflows,
/// are left out.
fn mean_by<'a>(
    view: &FilteredView<'a>,
    key: impl Fn(&'a Record) -> Option<&'a str>,
    value: impl Fn(&Record) -> Option<f64>,
) -> BTreeMap<&'a str, (f64, usize)> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for record in view.iter() {
        if let (Some(k), Some(v)) = (key(record), value(record)) {
            let entry = sums.entry(k).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(k, (sum, count))| (k, (sum / count as f64, count)))
        .filter(|(_, (mean, _))| mean.is_finite())
        .collect()
}

/// One row per ticker: the earliest-dated row carrying `value` (input order
/// breaks date ties). Output follows the order tickers were first seen.
fn representatives<'a>(
    rows: impl Iterator<Item = &'a Record>,
    value: impl Fn(&Record) -> Option<f64>,
) -> Vec<RankedTicker> {
    let mut picked: Vec<&Record> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in rows.filter(|r| value(r).is_some()) {
        match index.get(record.ticker()) {
            Some(&i) => {
                if record.date() < picked[i].date() {
                    picked[i] = record;
                }
            }
            None => {
                index.insert(record.ticker(), picked.len());
                picked.push(record);
            }
        }
    }

    picked
        .into_iter()
        .filter_map(|r| value(r).map(|v| RankedTicker::from_record(r, v)))
        .collect()
}

/// Stable sort then truncate, so equal values keep their input order.
fn top_n<T>(mut items: Vec<T>, n: usize, direction: Direction, key: impl Fn(&T) -> f64) -> Vec<T> {
    items.sort_by(|a, b| {
        let ordering = key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal);
        match direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    });
    items.truncate(n);
    items
}

/// Pairwise-complete Pearson coefficient. `None` below two shared dates or
/// when either side is constant.
fn pearson(x: &BTreeMap<NaiveDate, f64>, y: &BTreeMap<NaiveDate, f64>) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .filter_map(|(date, a)| y.get(date).map(|b| (*a, *b)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tickers(ranked: &[RankedTicker]) -> Vec<&str> {
        ranked.iter().map(|t| t.ticker.as_str()).collect()
    }

    #[test]
    fn volatility_is_the_per_ticker_mean_highest_first() {
        let store = RecordStore::from_records(vec![
            Record::new("A", day(2024, 1, 1)).with_volatility(0.10),
            Record::new("A", day(2024, 1, 2)).with_volatility(0.30),
            Record::new("B", day(2024, 1, 1)).with_volatility(0.25),
            Record::new("C", day(2024, 1, 1)),
            Record::new("D", day(2024, 1, 1)).with_volatility(0.05),
        ]);

        let ranking = AggregationEngine::default().volatility_ranking(&store.view());
        let names: Vec<&str> = ranking.iter().map(|e| e.ticker.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "D"]);
        assert_relative_eq!(ranking[1].mean_volatility, 0.20, epsilon = 1e-12);
        assert_eq!(ranking[1].observations, 2);
    }

    #[test]
    fn volatility_ranking_is_capped_and_ties_follow_ticker_order() {
        let records = (0..12)
            .map(|i| Record::new(format!("T{:02}", i), day(2024, 1, 1)).with_volatility(1.0))
            .collect();
        let store = RecordStore::from_records(records);

        let ranking = AggregationEngine::default().volatility_ranking(&store.view());
        assert_eq!(ranking.len(), 10);
        assert_eq!(ranking[0].ticker, "T00");
        assert_eq!(ranking[9].ticker, "T09");
    }

    #[test]
    fn sector_means_skip_missing_values_and_sectors() {
        let store = RecordStore::from_records(vec![
            Record::new("A", day(2024, 1, 1)).with_sector("Tech").with_yearly_return(10.0),
            Record::new("B", day(2024, 1, 1)).with_sector("Tech").with_yearly_return(20.0),
            Record::new("C", day(2024, 1, 1)).with_sector("Energy"),
            Record::new("D", day(2024, 1, 1)).with_yearly_return(99.0),
            Record::new("E", day(2024, 1, 1)).with_sector("Auto").with_yearly_return(-4.0),
        ]);

        let sectors = AggregationEngine::default().sector_mean_return(&store.view());
        assert_eq!(sectors.len(), 2);
        assert_eq!(sectors[0].sector, "Auto");
        assert_eq!(sectors[1].sector, "Tech");
        assert_relative_eq!(sectors[1].mean_yearly_return, 15.0);
        assert_eq!(sectors[1].observations, 2);
    }

    #[test]
    fn correlation_marks_uncomputable_cells() {
        let store = RecordStore::from_records(vec![
            Record::new("A", day(2024, 1, 1)).with_close(1.0),
            Record::new("A", day(2024, 1, 2)).with_close(2.0),
            Record::new("A", day(2024, 1, 3)).with_close(3.0),
            Record::new("B", day(2024, 1, 1)).with_close(30.0),
            Record::new("B", day(2024, 1, 2)).with_close(20.0),
            Record::new("B", day(2024, 1, 3)).with_close(10.0),
            Record::new("C", day(2024, 1, 3)).with_close(5.0),
            Record::new("C", day(2024, 1, 4)).with_close(6.0),
            Record::new("D", day(2024, 1, 1)).with_close(7.0),
            Record::new("D", day(2024, 1, 2)).with_close(7.0),
        ]);

        let matrix = AggregationEngine::default().correlation_matrix(&store.view());
        assert_eq!(matrix.tickers, vec!["A", "B", "C", "D"]);
        assert_relative_eq!(matrix.get("A", "B").unwrap(), -1.0, epsilon = 1e-12);
        assert_eq!(matrix.get("A", "A"), Some(1.0));
        // One shared date only.
        assert_eq!(matrix.get("A", "C"), None);
        // Constant series.
        assert_eq!(matrix.get("D", "D"), None);
        assert_eq!(matrix.get("A", "D"), None);
    }

    #[test]
    fn correlation_of_overflowing_series_is_undefined() {
        let store = RecordStore::from_records(vec![
            Record::new("A", day(2024, 1, 1)).with_close(-1e308),
            Record::new("A", day(2024, 1, 2)).with_close(1e308),
            Record::new("B", day(2024, 1, 1)).with_close(1.0),
            Record::new("B", day(2024, 1, 2)).with_close(3.0),
        ]);

        let matrix = AggregationEngine::default().correlation_matrix(&store.view());
        assert_eq!(matrix.get("A", "A"), None);
        assert_eq!(matrix.get("A", "B"), None);
        assert_eq!(matrix.get("B", "B"), Some(1.0));
    }

    #[test]
    fn overflowing_means_are_left_out() {
        let store = RecordStore::from_records(vec![
            Record::new("A", day(2024, 1, 1)).with_volatility(f64::MAX),
            Record::new("A", day(2024, 1, 2)).with_volatility(f64::MAX),
            Record::new("B", day(2024, 1, 1)).with_volatility(0.3),
        ]);

        let ranking = AggregationEngine::default().volatility_ranking(&store.view());
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].ticker, "B");
    }

    #[test]
    fn correlation_without_close_prices_is_empty() {
        let store = RecordStore::from_records(vec![Record::new("A", day(2024, 1, 1))]);
        assert!(AggregationEngine::default().correlation_matrix(&store.view()).is_empty());
    }

    #[test]
    fn cumulative_leaders_use_the_latest_value() {
        let mut records = Vec::new();
        for (i, ticker) in ["A", "B", "C", "D", "E", "F"].iter().enumerate() {
            let last = i as f64;
            // Early values are reversed so ranking by first value would differ.
            records.push(Record::new(*ticker, day(2024, 1, 2)).with_cumulative_return(last));
            records.push(Record::new(*ticker, day(2024, 1, 1)).with_cumulative_return(10.0 - last));
        }
        let store = RecordStore::from_records(records);

        let cumulative = AggregationEngine::default().cumulative_leaders(&store.view());
        assert_eq!(tickers(&cumulative.leaders), vec!["F", "E", "D", "C", "B"]);
        assert_eq!(cumulative.series.len(), 10);
        assert_eq!(cumulative.series[0].ticker, "F");
        assert_eq!(cumulative.series[0].date, day(2024, 1, 1));
        assert_eq!(cumulative.series[1].date, day(2024, 1, 2));
        assert!(cumulative.series.iter().all(|p| p.ticker != "A"));
    }

    #[test]
    fn yearly_representative_is_the_earliest_row() {
        let store = RecordStore::from_records(vec![
            Record::new("A", day(2024, 6, 1)).with_yearly_return(50.0),
            Record::new("A", day(2024, 1, 1)).with_yearly_return(5.0),
            Record::new("B", day(2024, 1, 1)).with_yearly_return(10.0),
            Record::new("C", day(2024, 1, 1)),
        ]);

        let yearly = AggregationEngine::default().yearly_performers(&store.view());
        assert_eq!(tickers(&yearly.best), vec!["B", "A"]);
        assert_eq!(yearly.best[1].value, 5.0);
        assert_eq!(tickers(&yearly.worst), vec!["A", "B"]);
    }

    #[rstest]
    #[case(4, false)]
    #[case(5, true)]
    fn monthly_movers_need_enough_tickers(#[case] count: usize, #[case] expected: bool) {
        let records = (0..count)
            .map(|i| Record::new(format!("T{}", i), day(2024, 3, 1)).with_monthly_return(i as f64))
            .collect();
        let store = RecordStore::from_records(records);

        let movers = AggregationEngine::default().monthly_movers(&store.view(), "March");
        assert_eq!(movers.is_some(), expected);
    }

    #[test]
    fn derived_table_scopes() {
        assert_eq!(DerivedTable::Volatility.scope(), DataScope::Filtered);
        assert_eq!(DerivedTable::Correlation.scope(), DataScope::Filtered);
        assert_eq!(DerivedTable::Cumulative.scope(), DataScope::TickersOnly);
        assert_eq!(DerivedTable::Yearly.scope(), DataScope::Full);
        assert_eq!(DerivedTable::MonthlyMovers.scope(), DataScope::Full);
    }
}
