use common::error::ConfigError;
use common::models::{Candle, Side, Signal};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const STRATEGY_NAME: &str = "Model_Confidence_v1";

/// Model output for one bar, in the class order the model was trained with:
/// SELL, HOLD, BUY.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub sell: f64,
    pub hold: f64,
    pub buy: f64,
}

impl ClassProbabilities {
    pub const CERTAIN_HOLD: Self = Self {
        sell: 0.0,
        hold: 1.0,
        buy: 0.0,
    };

    pub fn from_row(row: [f32; 3]) -> Self {
        Self {
            sell: f64::from(row[0]),
            hold: f64::from(row[1]),
            buy: f64::from(row[2]),
        }
    }
}

/// Turns class probabilities into signals, keeping only bars where the
/// model is at least `threshold` sure of a BUY or a SELL.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceFilter {
    threshold: f64,
}

impl ConfidenceFilter {
    pub fn new(threshold: f64) -> Result<Self, ConfigError> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(ConfigError::Invalid {
                key: "CONFIDENCE_THRESHOLD",
                value: threshold.to_string(),
                reason: "must lie strictly between 0 and 1".into(),
            });
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The more likely of BUY and SELL, when it reaches the threshold.
    /// Equality with the threshold passes; a BUY/SELL tie emits nothing.
    pub fn decide(&self, probs: &ClassProbabilities) -> Option<(Side, f64)> {
        let (side, confidence) = match probs.buy.partial_cmp(&probs.sell)? {
            Ordering::Greater => (Side::Buy, probs.buy),
            Ordering::Less => (Side::Sell, probs.sell),
            Ordering::Equal => return None,
        };
        (confidence >= self.threshold).then_some((side, confidence))
    }

    /// Pairs each bar with its probabilities and yields the bars that pass.
    pub fn apply<'a>(
        &'a self,
        candles: &'a [Candle],
        probs: &'a [ClassProbabilities],
    ) -> impl Iterator<Item = Signal> + 'a {
        candles.iter().zip(probs).filter_map(move |(bar, p)| {
            let (side, confidence) = self.decide(p)?;
            Some(Signal {
                asset_id: bar.asset_id,
                timestamp: bar.timestamp,
                side,
                entry_price: bar.close,
                stop_loss: None,
                take_profit: None,
                strength: confidence,
                strategy: STRATEGY_NAME.to_string(),
            })
        })
    }
}
