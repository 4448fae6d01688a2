use common::error::IndicatorError;
use common::models::{Candle, Side, Signal};

use super::{RegimeLookup, SIGNAL_WARMUP, SignalStrategy, check_history};
use crate::indicators::{self, Band};

pub const STRATEGY_NAME: &str = "Range_BB_RSI_v1";

pub const OVERSOLD: f64 = 30.0;
pub const OVERBOUGHT: f64 = 70.0;

#[derive(Debug, Clone, Default)]
pub struct RangeColumns {
    pub bands: Vec<Option<Band>>,
    pub rsi: Vec<Option<f64>>,
}

/// Fades band touches confirmed by RSI extremes. Only trades on days the
/// regime classifier called sideways.
#[derive(Debug, Clone, Copy)]
pub struct RangeMeanReversionStrategy {
    pub band_window: usize,
    pub band_width: f64,
    pub rsi_window: usize,
}

impl Default for RangeMeanReversionStrategy {
    fn default() -> Self {
        Self {
            band_window: 20,
            band_width: 2.0,
            rsi_window: 14,
        }
    }
}

impl RangeMeanReversionStrategy {
    pub fn columns(&self, candles: &[Candle]) -> Result<RangeColumns, IndicatorError> {
        let closes = indicators::closes(candles);
        Ok(RangeColumns {
            bands: indicators::bollinger(&closes, self.band_window, self.band_width)?,
            rsi: indicators::rsi(&closes, self.rsi_window)?,
        })
    }

    pub fn scan<'a>(
        &'a self,
        candles: &'a [Candle],
        cols: RangeColumns,
        regimes: &'a RegimeLookup,
    ) -> impl Iterator<Item = Signal> + 'a {
        (SIGNAL_WARMUP..candles.len()).filter_map(move |i| {
            let bar = &candles[i];
            if !regimes.regime_on(bar.date()).is_sideways() {
                return None;
            }
            let band = cols.bands[i]?;
            let rsi = cols.rsi[i]?;

            let side = if bar.close <= band.lower && rsi < OVERSOLD {
                Side::Buy
            } else if bar.close >= band.upper && rsi > OVERBOUGHT {
                Side::Sell
            } else {
                return None;
            };

            Some(Signal {
                asset_id: bar.asset_id,
                timestamp: bar.timestamp,
                side,
                entry_price: bar.close,
                stop_loss: None,
                take_profit: None,
                strength: 1.0,
                strategy: STRATEGY_NAME.to_string(),
            })
        })
    }
}

impl SignalStrategy for RangeMeanReversionStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn description(&self) -> &'static str {
        "Bollinger band touch with RSI below 30 or above 70, on sideways days"
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
