//! Rolling indicators over candle series.
//!
//! Every function returns a vector aligned with its input; positions inside
//! the warm-up window are `None`. The moving averages and Bollinger bands
//! come from `ta`, fed bar by bar. ATR, ADX and RSI live in [`wilder`].

pub mod wilder;

use common::error::IndicatorError;
use common::models::Candle;
use ta::Next;
use ta::indicators::{BollingerBands, ExponentialMovingAverage, SimpleMovingAverage};

pub use wilder::{AdxIndicator, AtrIndicator, RsiIndicator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub lower: f64,
    pub middle: f64,
    pub upper: f64,
}

fn check_window(window: usize) -> Result<(), IndicatorError> {
    if window == 0 {
        return Err(IndicatorError::InvalidWindow(window));
    }
    Ok(())
}

/// Feeds `values` through a streaming indicator and masks everything before
/// index `first_valid`.
fn stream<I, O>(mut indicator: I, values: &[f64], first_valid: usize) -> Vec<Option<O>>
where
    I: Next<f64, Output = O>,
{
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let out = indicator.next(v);
            (i >= first_valid).then_some(out)
        })
        .collect()
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub fn sma(closes: &[f64], window: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    check_window(window)?;
    let indicator =
        SimpleMovingAverage::new(window).map_err(|_| IndicatorError::InvalidWindow(window))?;
    Ok(stream(indicator, closes, window - 1))
}

/// Exponential average with `alpha = 2 / (window + 1)`, seeded with the first
/// close and not adjusted for the initial bias.
pub fn ema(closes: &[f64], window: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    check_window(window)?;
    let indicator = ExponentialMovingAverage::new(window)
        .map_err(|_| IndicatorError::InvalidWindow(window))?;
    Ok(stream(indicator, closes, window - 1))
}

/// RSI needs `window` price changes, so the first value sits at `window`.
pub fn rsi(closes: &[f64], window: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    check_window(window)?;
    let mut indicator = RsiIndicator::new(window);
    Ok(closes.iter().map(|&c| indicator.update(c)).collect())
}

pub fn bollinger(
    closes: &[f64],
    window: usize,
    multiplier: f64,
) -> Result<Vec<Option<Band>>, IndicatorError> {
    check_window(window)?;
    let mut indicator = BollingerBands::new(window, multiplier)
        .map_err(|_| IndicatorError::InvalidWindow(window))?;

    Ok(closes
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let out = indicator.next(v);
            (i + 1 >= window).then_some(Band {
                lower: out.lower,
                middle: out.average,
                upper: out.upper,
            })
        })
        .collect())
}

pub fn atr(candles: &[Candle], window: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    check_window(window)?;
    let mut indicator = AtrIndicator::new(window);
    Ok(candles
        .iter()
        .map(|c| indicator.update(c.high, c.low, c.close))
        .collect())
}

pub fn adx(candles: &[Candle], window: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    check_window(window)?;
    let mut indicator = AdxIndicator::new(window);
    Ok(candles
        .iter()
        .map(|c| indicator.update(c.high, c.low, c.close))
        .collect())
}

/// Rejects series the indicators cannot be trusted on: timestamps that do
/// not strictly increase, non-finite prices and bars with `high < low`.
pub fn validate(candles: &[Candle]) -> Result<(), IndicatorError> {
    for (index, candle) in candles.iter().enumerate() {
        let prices = [candle.open, candle.high, candle.low, candle.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(IndicatorError::NonFinite { index });
        }
        if candle.high < candle.low {
            return Err(IndicatorError::InvertedRange { index });
        }
        if index > 0 && candle.timestamp <= candles[index - 1].timestamp {
            return Err(IndicatorError::NonMonotonic { index });
        }
    }
    Ok(())
}
