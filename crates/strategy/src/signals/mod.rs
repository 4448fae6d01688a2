pub mod range;
pub mod trend;

use chrono::NaiveDate;
use common::error::IndicatorError;
use common::models::{Candle, DailyRegimeRecord, MarketRegime, Signal};
use std::collections::HashMap;

pub use range::RangeMeanReversionStrategy;
pub use trend::TrendFollowingStrategy;

/// Bars skipped before any signal is evaluated: the slowest average needs
/// this much history.
pub const SIGNAL_WARMUP: usize = 200;

/// Date → regime map of one asset, built once per run and only read while
/// signals are generated.
#[derive(Debug, Clone, Default)]
pub struct RegimeLookup {
    by_date: HashMap<NaiveDate, MarketRegime>,
}

impl RegimeLookup {
    pub fn new(by_date: HashMap<NaiveDate, MarketRegime>) -> Self {
        Self { by_date }
    }

    pub fn from_records(records: &[DailyRegimeRecord]) -> Self {
        Self::new(records.iter().map(|r| (r.date, r.regime)).collect())
    }

    /// Regime of `date`, `Unknown` when that day was never classified.
    pub fn regime_on(&self, date: NaiveDate) -> MarketRegime {
        self.by_date
            .get(&date)
            .copied()
            .unwrap_or(MarketRegime::Unknown)
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }
}

pub trait SignalStrategy: Send + Sync {
    /// Stored with every signal the strategy emits.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Signals for one asset's intraday series, oldest first. Indicators are
    /// computed eagerly; signals are yielded as the series is scanned.
    fn generate<'a>(
        &'a self,
        candles: &'a [Candle],
        regimes: &'a RegimeLookup,
    ) -> Result<Box<dyn Iterator<Item = Signal> + 'a>, IndicatorError>;
}

pub(crate) fn check_history(candles: &[Candle]) -> Result<(), IndicatorError> {
    crate::indicators::validate(candles)?;
    if candles.len() < SIGNAL_WARMUP {
        return Err(IndicatorError::InsufficientHistory {
            required: SIGNAL_WARMUP,
            available: candles.len(),
        });
    }
    Ok(())
}
