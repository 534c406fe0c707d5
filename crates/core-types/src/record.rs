use crate::error::SchemaError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

/// A single untyped row as handed over by a row source (database query or file).
pub type RawRow = Map<String, Value>;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Calendar fields derived from a record's date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub month: u32,
    pub month_name: &'static str,
    pub year: i32,
    /// "%B %Y", e.g. "March 2024".
    pub month_year_label: String,
}

impl Period {
    pub fn from_date(date: NaiveDate) -> Self {
        let month = date.month();
        let month_name = MONTH_NAMES[date.month0() as usize];
        Self {
            month,
            month_name,
            year: date.year(),
            month_year_label: format!("{} {}", month_name, date.year()),
        }
    }
}

/// One row of daily data for one ticker.
///
/// Records are immutable once built. The calendar fields are derived from
/// `date` at construction and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    ticker: String,
    date: NaiveDate,
    sector: Option<String>,
    close: Option<f64>,
    volatility: Option<f64>,
    yearly_return: Option<f64>,
    monthly_return: Option<f64>,
    cumulative_return: Option<f64>,
    #[serde(flatten)]
    period: Period,
}

impl Record {
    /// Creates a record with every optional measurement absent.
    pub fn new(ticker: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            date,
            sector: None,
            close: None,
            volatility: None,
            yearly_return: None,
            monthly_return: None,
            cumulative_return: None,
            period: Period::from_date(date),
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        let sector = sector.into();
        self.sector = if sector.trim().is_empty() { None } else { Some(sector) };
        self
    }

    pub fn with_close(mut self, close: f64) -> Self {
        self.close = finite(close);
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = finite(volatility);
        self
    }

    pub fn with_yearly_return(mut self, value: f64) -> Self {
        self.yearly_return = finite(value);
        self
    }

    pub fn with_monthly_return(mut self, value: f64) -> Self {
        self.monthly_return = finite(value);
        self
    }

    pub fn with_cumulative_return(mut self, value: f64) -> Self {
        self.cumulative_return = finite(value);
        self
    }

    /// Parses one raw row. `index` is only used for error reporting.
    ///
    /// Field names are matched case-insensitively, so both `Ticker` and
    /// `ticker` are accepted. `null`, a missing key, an empty string, NaN or
    /// an infinity all mean "absent" for the optional fields.
    pub fn from_raw(index: usize, row: &RawRow) -> Result<Self, SchemaError> {
        let ticker = match field(row, "ticker") {
            None | Some(Value::Null) => {
                return Err(SchemaError::MissingField { row: index, field: "ticker" });
            }
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
        };
        if ticker.is_empty() {
            return Err(SchemaError::EmptyTicker { row: index });
        }

        let date = match field(row, "date") {
            None | Some(Value::Null) => {
                return Err(SchemaError::MissingField { row: index, field: "date" });
            }
            Some(value) => parse_date(value).ok_or_else(|| SchemaError::InvalidDate {
                row: index,
                value: display(value),
            })?,
        };

        let sector = match field(row, "sector") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(SchemaError::InvalidValue {
                    row: index,
                    field: "sector",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            ticker,
            date,
            sector,
            close: optional_f64(index, row, "close")?,
            volatility: optional_f64(index, row, "volatility")?,
            yearly_return: optional_f64(index, row, "yearly_return")?,
            monthly_return: optional_f64(index, row, "monthly_return")?,
            cumulative_return: optional_f64(index, row, "cumulative_return")?,
            period: Period::from_date(date),
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn sector(&self) -> Option<&str> {
        self.sector.as_deref()
    }

    pub fn close(&self) -> Option<f64> {
        self.close
    }

    pub fn volatility(&self) -> Option<f64> {
        self.volatility
    }

    pub fn yearly_return(&self) -> Option<f64> {
        self.yearly_return
    }

    pub fn monthly_return(&self) -> Option<f64> {
        self.monthly_return
    }

    pub fn cumulative_return(&self) -> Option<f64> {
        self.cumulative_return
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    /// Month number, 1 to 12.
    pub fn month(&self) -> u32 {
        self.period.month
    }

    pub fn month_name(&self) -> &'static str {
        self.period.month_name
    }

    pub fn year(&self) -> i32 {
        self.period.year
    }

    pub fn month_year_label(&self) -> &str {
        &self.period.month_year_label
    }
}

fn finite(value: f64) -> Option<f64> {
    if value.is_finite() { Some(value) } else { None }
}

fn field<'a>(row: &'a RawRow, name: &str) -> Option<&'a Value> {
    row.get(name).or_else(|| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|datetime| datetime.date_naive())
}

fn optional_f64(
    index: usize,
    row: &RawRow,
    name: &'static str,
) -> Result<Option<f64>, SchemaError> {
    let invalid = |value: &Value| SchemaError::InvalidValue {
        row: index,
        field: name,
        value: display(value),
    };

    match field(row, name) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Number(n)) => n.as_f64().map(finite).ok_or_else(|| invalid(value)),
        Some(value @ Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(finite)
                .map_err(|_| invalid(value))
        }
        Some(other) => Err(invalid(other)),
    }
}
