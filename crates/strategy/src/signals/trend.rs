use common::error::IndicatorError;
use common::models::{Candle, MarketRegime, Side, Signal};
use tracing::debug;

use super::{RegimeLookup, SIGNAL_WARMUP, SignalStrategy, check_history};
use crate::indicators;

pub const STRATEGY_NAME: &str = "Trend_EMA_ADX_v1";

/// ADX a crossover has to clear to count as a trending move.
pub const TREND_ADX: f64 = 25.0;
pub const ATR_STOP_MULTIPLIER: f64 = 3.0;
/// Take-profit distance as a multiple of the stop distance.
pub const REWARD_RISK: f64 = 2.0;

/// Stop-loss and take-profit around `entry` for a position on `side`.
pub fn protective_levels(side: Side, entry: f64, atr: f64) -> (f64, f64) {
    let stop = match side {
        Side::Buy => entry - ATR_STOP_MULTIPLIER * atr,
        Side::Sell => entry + ATR_STOP_MULTIPLIER * atr,
    };
    let reward = REWARD_RISK * (entry - stop).abs();
    let take_profit = match side {
        Side::Buy => entry + reward,
        Side::Sell => entry - reward,
    };
    (stop, take_profit)
}

/// Indicator columns the trend scan reads, aligned with the candle slice.
#[derive(Debug, Clone, Default)]
pub struct TrendColumns {
    pub ema_fast: Vec<Option<f64>>,
    pub ema_slow: Vec<Option<f64>>,
    pub adx: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
}

/// EMA 50/200 crossover confirmed by ADX, taken only in the direction of the
/// day's regime.
#[derive(Debug, Clone, Copy)]
pub struct TrendFollowingStrategy {
    pub fast_window: usize,
    pub slow_window: usize,
    pub adx_window: usize,
    pub atr_window: usize,
}

impl Default for TrendFollowingStrategy {
    fn default() -> Self {
        Self {
            fast_window: 50,
            slow_window: 200,
            adx_window: 14,
            atr_window: 14,
        }
    }
}

impl TrendFollowingStrategy {
    pub fn columns(&self, candles: &[Candle]) -> Result<TrendColumns, IndicatorError> {
        let closes = indicators::closes(candles);
        Ok(TrendColumns {
            ema_fast: indicators::ema(&closes, self.fast_window)?,
            ema_slow: indicators::ema(&closes, self.slow_window)?,
            adx: indicators::adx(candles, self.adx_window)?,
            atr: indicators::atr(candles, self.atr_window)?,
        })
    }

    /// Walks the bars after the warm-up and emits one signal per crossover
    /// bar that the regime of its calendar date allows. Bars whose
    /// indicators are still missing are skipped.
    pub fn scan<'a>(
        &'a self,
        candles: &'a [Candle],
        cols: TrendColumns,
        regimes: &'a RegimeLookup,
    ) -> impl Iterator<Item = Signal> + 'a {
        (SIGNAL_WARMUP.max(1)..candles.len()).filter_map(move |i| {
            let bar = &candles[i];
            let regime = regimes.regime_on(bar.date());

            let fast = cols.ema_fast[i]?;
            let slow = cols.ema_slow[i]?;
            let prev_fast = cols.ema_fast[i - 1]?;
            let prev_slow = cols.ema_slow[i - 1]?;
            let adx = cols.adx[i]?;
            let atr = cols.atr[i]?;

            let trending = adx > TREND_ADX;
            let side = match regime {
                MarketRegime::BullishTrend if trending && fast > slow && prev_fast <= prev_slow => {
                    Side::Buy
                }
                MarketRegime::BearishTrend if trending && fast < slow && prev_fast >= prev_slow => {
                    Side::Sell
                }
                _ => return None,
            };

            let (stop_loss, take_profit) = protective_levels(side, bar.close, atr);
            debug!(
                "{} {} @ {:.5} on {} (adx {:.1}, stop {:.5})",
                STRATEGY_NAME, side, bar.close, bar.timestamp, adx, stop_loss
            );

            Some(Signal {
                asset_id: bar.asset_id,
                timestamp: bar.timestamp,
                side,
                entry_price: bar.close,
                stop_loss: Some(stop_loss),
                take_profit: Some(take_profit),
                strength: 1.0,
                strategy: STRATEGY_NAME.to_string(),
            })
        })
    }
}

impl SignalStrategy for TrendFollowingStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn description(&self) -> &'static str {
        "EMA 50/200 crossover with ADX above 25, in the direction of the daily trend regime"
    }

    fn generate<'a>(
        &'a self,
        candles: &'a [Candle],
        regimes: &'a RegimeLookup,
    ) -> Result<Box<dyn Iterator<Item = Signal> + 'a>, IndicatorError> {
        check_history(candles)?;
        let cols = self.columns(candles)?;
        Ok(Box::new(self.scan(candles, cols, regimes)))
    }
}
