use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseLabelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "H1")]
    H1,
    #[serde(rename = "H4")]
    H4,
    #[serde(rename = "D")]
    Daily,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::H1 => "H1",
            Self::H4 => "H4",
            Self::Daily => "D",
        }
    }

    pub fn is_intraday(&self) -> bool {
        !matches!(self, Self::Daily)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "H1" => Ok(Self::H1),
            "H4" => Ok(Self::H4),
            "D" => Ok(Self::Daily),
            other => Err(ParseLabelError::new("granularity", other)),
        }
    }
}

/// One OHLCV bar. Keyed by (asset_id, timestamp, granularity) and never
/// modified after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub asset_id: i64,
    pub timestamp: DateTime<Utc>,
    pub granularity: Granularity,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// UTC calendar date of the bar, used to join intraday bars with the
    /// daily regime.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}
