use crate::error::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub rankings: RankingLimits,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where the raw rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The `stock_data` table in PostgreSQL (`DATABASE_URL`).
    #[default]
    Database,
    /// A JSON file holding an array of row objects.
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    /// Required when `kind = "file"`.
    pub path: Option<PathBuf>,
    pub table: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Database,
            path: None,
            table: "stock_data".to_string(),
        }
    }
}

/// Sizes of the ranked tables and the minimum population for monthly movers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RankingLimits {
    pub volatility_top: usize,
    pub cumulative_top: usize,
    pub yearly_top: usize,
    pub monthly_top: usize,
    /// Monthly movers are skipped below this many distinct tickers.
    pub monthly_min_tickers: usize,
    pub preview_rows: usize,
}

impl Default for RankingLimits {
    fn default() -> Self {
        Self {
            volatility_top: 10,
            cumulative_top: 5,
            yearly_top: 10,
            monthly_top: 5,
            monthly_min_tickers: 5,
            preview_rows: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// When set, logs are also written to a daily rolling file here.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl Config {
    /// Rejects settings the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rankings.validate()?;

        if self.source.kind == SourceKind::File && self.source.path.is_none() {
            return Err(ConfigError::ValidationError(
                "source.path must be set when source.kind = \"file\"".to_string(),
            ));
        }

        let table = &self.source.table;
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::ValidationError(format!(
                "source.table '{}' is not a plain identifier",
                table
            )));
        }

        Ok(())
    }
}

impl RankingLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("volatility_top", self.volatility_top),
            ("cumulative_top", self.cumulative_top),
            ("yearly_top", self.yearly_top),
            ("monthly_top", self.monthly_top),
            ("monthly_min_tickers", self.monthly_min_tickers),
            ("preview_rows", self.preview_rows),
        ];

        for (name, value) in fields {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "rankings.{} must be at least 1",
                    name
                )));
            }
        }

        Ok(())
    }
}
