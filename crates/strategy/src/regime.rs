use common::error::IndicatorError;
use common::models::{Candle, DailyRegimeRecord, MarketRegime};

use crate::indicators;

/// ATR as a fraction of price above which a day is flagged high-volatility.
pub const VOLATILITY_THRESHOLD: f64 = 0.015;

/// ADX below this reads as a quiet, directionless market.
pub const QUIET_ADX: f64 = 20.0;

/// Indicator values of one fully warmed-up day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayIndicators {
    pub close: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub atr: f64,
    pub adx: f64,
}

type Rule = (fn(&DayIndicators) -> bool, MarketRegime);

fn bullish(d: &DayIndicators) -> bool {
    d.close > d.sma_fast && d.sma_fast > d.sma_slow
}

fn bearish(d: &DayIndicators) -> bool {
    d.close < d.sma_fast && d.sma_fast < d.sma_slow
}

fn quiet(d: &DayIndicators) -> bool {
    d.adx < QUIET_ADX
}

/// Evaluated top to bottom, first match wins. A day matching none of them is
/// `SidewaysChoppy`.
const RULES: [Rule; 3] = [
    (bullish, MarketRegime::BullishTrend),
    (bearish, MarketRegime::BearishTrend),
    (quiet, MarketRegime::SidewaysQuiet),
];

pub fn classify(day: &DayIndicators) -> MarketRegime {
    RULES
        .iter()
        .find(|(matches, _)| matches(day))
        .map(|&(_, regime)| regime)
        .unwrap_or(MarketRegime::SidewaysChoppy)
}

pub fn is_high_volatility(day: &DayIndicators) -> bool {
    day.atr / day.close > VOLATILITY_THRESHOLD
}

#[derive(Debug, Clone, Copy)]
pub struct RegimeClassifier {
    pub fast_window: usize,
    pub slow_window: usize,
    pub atr_window: usize,
    pub adx_window: usize,
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self {
            fast_window: 50,
            slow_window: 200,
            atr_window: 14,
            adx_window: 14,
        }
    }
}

impl RegimeClassifier {
    /// Bars needed before the first day can be classified.
    pub fn warmup(&self) -> usize {
        self.fast_window
            .max(self.slow_window)
            .max(self.atr_window)
            .max(2 * self.adx_window)
    }

    /// Classifies each daily candle that has full indicator coverage.
    ///
    /// Indicator columns are computed up front; the records themselves are
    /// produced lazily, oldest first. `candles` must be one asset's daily
    /// series in ascending time order.
    pub fn classify_series<'a>(
        &self,
        candles: &'a [Candle],
    ) -> Result<impl Iterator<Item = DailyRegimeRecord> + use<'a>, IndicatorError> {
        indicators::validate(candles)?;
        if candles.len() < self.warmup() {
            return Err(IndicatorError::InsufficientHistory {
                required: self.warmup(),
                available: candles.len(),
            });
        }

        let closes = indicators::closes(candles);
        let sma_fast = indicators::sma(&closes, self.fast_window)?;
        let sma_slow = indicators::sma(&closes, self.slow_window)?;
        let atr = indicators::atr(candles, self.atr_window)?;
        let adx = indicators::adx(candles, self.adx_window)?;

        Ok(candles.iter().enumerate().filter_map(move |(i, candle)| {
            let day = DayIndicators {
                close: candle.close,
                sma_fast: sma_fast[i]?,
                sma_slow: sma_slow[i]?,
                atr: atr[i]?,
                adx: adx[i]?,
            };
            Some(DailyRegimeRecord {
                asset_id: candle.asset_id,
                date: candle.date(),
                regime: classify(&day),
                sma_fast: day.sma_fast,
                sma_slow: day.sma_slow,
                atr: day.atr,
                adx: day.adx,
                high_volatility: is_high_volatility(&day),
            })
        }))
    }
}
