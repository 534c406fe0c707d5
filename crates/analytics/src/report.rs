use chrono::NaiveDate;
use core_types::{FilterSelection, Record};
use serde::Serialize;

/// Mean volatility of one ticker over the rows it has in the view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityEntry {
    pub ticker: String,
    pub mean_volatility: f64,
    /// Rows that carried a volatility value.
    pub observations: usize,
}

/// Mean yearly return of one sector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorReturn {
    pub sector: String,
    pub mean_yearly_return: f64,
    pub observations: usize,
}

/// Pairwise Pearson correlation of close prices, one row and column per ticker.
///
/// A `None` cell means the coefficient is not computable (fewer than two
/// overlapping dates, or a constant series). It is never conflated with 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub tickers: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn index_of(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// `None` when either ticker is unknown or the cell is undefined.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let (i, j) = (self.index_of(a)?, self.index_of(b)?);
        self.values[i][j]
    }
}

/// One ticker's position in a ranking, with the row its value was read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTicker {
    pub ticker: String,
    pub sector: Option<String>,
    pub date: NaiveDate,
    pub value: f64,
}

impl RankedTicker {
    pub(crate) fn from_record(record: &Record, value: f64) -> Self {
        Self {
            ticker: record.ticker().to_string(),
            sector: record.sector().map(str::to_string),
            date: record.date(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub ticker: String,
    pub date: NaiveDate,
    pub cumulative_return: f64,
}

/// The leading tickers by final cumulative return and their full time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CumulativeReturns {
    pub leaders: Vec<RankedTicker>,
    /// Ordered by leader rank, then date.
    pub series: Vec<SeriesPoint>,
}

impl CumulativeReturns {
    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YearlyPerformers {
    /// Descending by yearly return.
    pub best: Vec<RankedTicker>,
    /// Ascending by yearly return.
    pub worst: Vec<RankedTicker>,
}

impl YearlyPerformers {
    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }
}

/// Top and bottom monthly returns for one month name. Membership may overlap
/// when the month has fewer than twice the ranking size of tickers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyMovers {
    pub month: String,
    pub gainers: Vec<RankedTicker>,
    pub losers: Vec<RankedTicker>,
}

/// Every derived table for one selection over one store.
///
/// Empty tables (and `monthly_movers == None`) mean "skip this view".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub selection: FilterSelection,
    pub filtered_rows: usize,
    pub preview: Vec<Record>,
    pub volatility: Vec<VolatilityEntry>,
    pub sector_returns: Vec<SectorReturn>,
    pub correlation: CorrelationMatrix,
    pub cumulative: CumulativeReturns,
    pub yearly: YearlyPerformers,
    pub monthly_movers: Option<MonthlyMovers>,
}
