use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The value a UI control uses to mean "no restriction".
pub const ALL_SENTINEL: &str = "All";

/// A set-valued filter dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection<T: Ord> {
    #[default]
    All,
    Only(BTreeSet<T>),
}

impl<T: Ord> Selection<T> {
    /// An empty set collapses to `All`.
    pub fn only<I: IntoIterator<Item = T>>(values: I) -> Self {
        let values: BTreeSet<T> = values.into_iter().collect();
        if values.is_empty() { Selection::All } else { Selection::Only(values) }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    pub fn contains(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(values) => values.contains(value),
        }
    }
}

impl Selection<String> {
    /// Builds a selection from raw multi-select choices. Choosing nothing or
    /// choosing the sentinel both mean "all".
    pub fn from_choices<S: AsRef<str>>(choices: &[S]) -> Self {
        if choices.iter().any(|c| c.as_ref() == ALL_SENTINEL) {
            return Selection::All;
        }
        Selection::only(choices.iter().map(|c| c.as_ref().to_string()))
    }

    /// Borrowed membership test, avoids allocating a `String` per row.
    pub fn contains_str(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(values) => values.contains(value),
        }
    }
}

/// The active filter, one value per dimension. `None` means "all".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FilterSelection {
    pub tickers: Selection<String>,
    pub sectors: Selection<String>,
    pub month: Option<String>,
    pub year: Option<i32>,
}

impl FilterSelection {
    /// Selects every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a selection from the raw values produced by filter controls.
    pub fn from_choices<S: AsRef<str>>(
        tickers: &[S],
        sectors: &[S],
        month: Option<&str>,
        year: Option<&str>,
    ) -> Result<Self, CoreError> {
        let month = month
            .map(str::trim)
            .filter(|m| !m.is_empty() && *m != ALL_SENTINEL)
            .map(str::to_string);

        let year = match year.map(str::trim) {
            None | Some("") | Some(ALL_SENTINEL) => None,
            Some(text) => Some(text.parse::<i32>().map_err(|_| {
                CoreError::InvalidInput("year".to_string(), text.to_string())
            })?),
        };

        Ok(Self {
            tickers: Selection::from_choices(tickers),
            sectors: Selection::from_choices(sectors),
            month,
            year,
        })
    }

    pub fn with_tickers<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tickers = Selection::only(tickers.into_iter().map(Into::into));
        self
    }

    pub fn with_sectors<I, S>(mut self, sectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sectors = Selection::only(sectors.into_iter().map(Into::into));
        self
    }

    pub fn with_month(mut self, month: impl Into<String>) -> Self {
        self.month = Some(month.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// True when no dimension restricts the rows.
    pub fn is_unrestricted(&self) -> bool {
        self.tickers.is_all() && self.sectors.is_all() && self.month.is_none() && self.year.is_none()
    }
}
