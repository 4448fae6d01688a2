use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseLabelError;

/// Daily market state. `Unknown` is never produced by the classifier; it is
/// what a lookup returns for a date without a record, and it gates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    BullishTrend,
    BearishTrend,
    SidewaysQuiet,
    SidewaysChoppy,
    Unknown,
}

impl MarketRegime {
    pub const ALL: [MarketRegime; 5] = [
        Self::BullishTrend,
        Self::BearishTrend,
        Self::SidewaysQuiet,
        Self::SidewaysChoppy,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BullishTrend => "BULLISH_TREND",
            Self::BearishTrend => "BEARISH_TREND",
            Self::SidewaysQuiet => "SIDEWAYS_QUIET",
            Self::SidewaysChoppy => "SIDEWAYS_CHOPPY",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_sideways(&self) -> bool {
        matches!(self, Self::SidewaysQuiet | Self::SidewaysChoppy)
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketRegime {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| ParseLabelError::new("regime", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRegimeRecord {
    pub asset_id: i64,
    pub date: NaiveDate,
    pub regime: MarketRegime,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub atr: f64,
    pub adx: f64,
    pub high_volatility: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regime_labels_parse_back() {
        for regime in MarketRegime::ALL {
            assert_eq!(regime.as_str().parse::<MarketRegime>().unwrap(), regime);
        }
        assert!("Bullish_Trend".parse::<MarketRegime>().is_err());
    }

    #[test]
    fn test_sideways_variants() {
        assert!(MarketRegime::SidewaysQuiet.is_sideways());
        assert!(MarketRegime::SidewaysChoppy.is_sideways());
        assert!(!MarketRegime::Unknown.is_sideways());
        assert!(!MarketRegime::BearishTrend.is_sideways());
    }
}
