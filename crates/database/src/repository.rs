use crate::DbError;
use chrono::NaiveDate;
use core_types::RawRow;
use serde_json::{json, Value};
use sqlx::postgres::PgPool;
use sqlx::FromRow;

/// One row of the stock table as stored.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbStockRow {
    pub ticker: String,
    pub date: NaiveDate,
    pub sector: Option<String>,
    pub close: Option<f64>,
    pub volatility: Option<f64>,
    pub yearly_return: Option<f64>,
    pub monthly_return: Option<f64>,
    pub cumulative_return: Option<f64>,
}

impl DbStockRow {
    /// Converts into the field map the record store parses.
    pub fn into_raw(self) -> RawRow {
        let mut row = RawRow::new();
        row.insert("ticker".to_string(), Value::String(self.ticker));
        row.insert("date".to_string(), Value::String(self.date.format("%Y-%m-%d").to_string()));
        row.insert("sector".to_string(), self.sector.map_or(Value::Null, Value::String));

        for (name, value) in [
            ("close", self.close),
            ("volatility", self.volatility),
            ("yearly_return", self.yearly_return),
            ("monthly_return", self.monthly_return),
            ("cumulative_return", self.cumulative_return),
        ] {
            row.insert(name.to_string(), value.map_or(Value::Null, |v| json!(v)));
        }
        row
    }
}

/// Read access to the daily stock table.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: PgPool,
    table: String,
}

impl StockRepository {
    /// `table` must be a plain identifier; configuration validation enforces it.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Fetches every row, ordered by date then ticker.
    pub async fn fetch_rows(&self) -> Result<Vec<RawRow>, DbError> {
        let sql = format!(
            "SELECT ticker, date, sector, close, volatility, yearly_return, monthly_return, cumulative_return \
             FROM {} ORDER BY date, ticker",
            self.table
        );

        let rows = sqlx::query_as::<_, DbStockRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        tracing::info!(table = %self.table, rows = rows.len(), "Fetched stock rows.");
        Ok(rows.into_iter().map(DbStockRow::into_raw).collect())
    }

    /// A fingerprint of the table contents: row count, latest date and a
    /// checksum over every row, so in-place corrections also change it.
    pub async fn data_version(&self) -> Result<String, DbError> {
        let (count, latest, checksum) =
            sqlx::query_as::<_, (i64, Option<NaiveDate>, i64)>(&version_sql(&self.table))
                .fetch_one(&self.pool)
                .await?;

        Ok(format_version(&self.table, count, latest, checksum))
    }
}

fn version_sql(table: &str) -> String {
    format!(
        "SELECT COUNT(*)::BIGINT, MAX(t.date), COALESCE(SUM(hashtext(t::text)), 0)::BIGINT \
         FROM {} AS t",
        table
    )
}

fn format_version(table: &str, count: i64, latest: Option<NaiveDate>, checksum: i64) -> String {
    match latest {
        Some(date) => format!("{}:{}:{}:{}", table, count, date, checksum),
        None => format!("{}:{}:empty", table, count),
    }
}
