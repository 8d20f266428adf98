use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScrapeError;

/// Delivery day the results are requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketDay(NaiveDate);

impl MarketDay {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Day-ahead results for `D` clear on `D - 1`, so nothing later than
    /// tomorrow can have been published yet.
    pub fn is_published(&self, today: NaiveDate) -> bool {
        self.0 <= today + Duration::days(1)
    }

    /// `YYYY-MM-DD`, the form the results page expects in its query string.
    pub fn query_value(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl FromStr for MarketDay {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(MarketDay)
            .map_err(|e| ScrapeError::InvalidArgument(format!("date '{}' is not YYYY-MM-DD: {}", s, e)))
    }
}

impl fmt::Display for MarketDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query_value())
    }
}

/// Time-slot label of a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotLabel {
    /// 1-based position of the row, used when the table carries no label cell.
    Index(u32),
    /// Label text shown by the page, e.g. `00:00-01:00`.
    Text(String),
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotLabel::Index(n) => write!(f, "{}", n),
            SlotLabel::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub slot: SlotLabel,
    /// Positional price/volume fields; `None` where the page shows `-`.
    pub values: Vec<Option<f64>>,
}

impl ResultRow {
    pub fn new(slot: SlotLabel, values: Vec<Option<f64>>) -> Self {
        Self { slot, values }
    }

    /// Cells this row occupies in a sheet: the label plus every field.
    pub fn width(&self) -> usize {
        1 + self.values.len()
    }
}

/// Rows of one delivery day, in the order the page displays them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub day: MarketDay,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(day: MarketDay, rows: Vec<ResultRow>) -> Self {
        Self { day, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest row, label included.
    pub fn max_width(&self) -> usize {
        self.rows.iter().map(ResultRow::width).max().unwrap_or(0)
    }
}
