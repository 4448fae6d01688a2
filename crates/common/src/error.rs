use thiserror::Error;

use crate::models::Granularity;

/// Failures raised by the candle/regime/signal store contracts.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Connectivity(String),
    #[error("duplicate key: {0}")]
    Conflict(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("window must be positive, got {0}")]
    InvalidWindow(usize),
    #[error("timestamps not strictly increasing at index {index}")]
    NonMonotonic { index: usize },
    #[error("non-finite price at index {index}")]
    NonFinite { index: usize },
    #[error("high below low at index {index}")]
    InvertedRange { index: usize },
    #[error("need at least {required} bars, got {available}")]
    InsufficientHistory { required: usize, available: usize },
}

/// Per-asset failure taxonomy. None of these abort a run; the runner logs
/// the error and moves on to the next asset.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no {granularity} candles for asset {asset_id}")]
    DataUnavailable {
        asset_id: i64,
        granularity: Granularity,
    },
    #[error("indicator computation failed: {0}")]
    IndicatorComputation(#[from] IndicatorError),
    #[error("already recorded: {0}")]
    PersistenceConflict(String),
    #[error("connectivity error: {0}")]
    Connectivity(String),
    #[error("corrupt stored row: {0}")]
    CorruptData(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("export failed: {0}")]
    Export(String),
}

impl From<StoreError> for PipelineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => Self::PersistenceConflict(msg),
            StoreError::Connectivity(msg) => Self::Connectivity(msg),
            StoreError::Corrupt(msg) => Self::CorruptData(msg),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
