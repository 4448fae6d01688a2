pub mod asset;
pub mod candle;
pub mod regime;
pub mod signal;

use thiserror::Error;

pub use asset::Asset;
pub use candle::{Candle, Granularity};
pub use regime::{DailyRegimeRecord, MarketRegime};
pub use signal::{Side, Signal};

/// A stored label that does not map to any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} label: {value:?}")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseLabelError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
