use common::error::IndicatorError;
use common::models::{Candle, MarketRegime};
use ndarray::Array2;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::indicators;
use crate::signals::RegimeLookup;

/// Model inputs, in matrix column order. Raw prices and time are not part of
/// it; volume is.
pub const FEATURE_COLUMNS: [&str; 11] = [
    "volume",
    "ema_50",
    "ema_200",
    "adx_14",
    "atr_14",
    "rsi_14",
    "regime_bullish_trend",
    "regime_bearish_trend",
    "regime_sideways_quiet",
    "regime_sideways_choppy",
    "regime_unknown",
];

/// Model input: one row per bar, one column per entry of [`FEATURE_COLUMNS`].
pub type FeatureMatrix = Array2<f32>;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataframe error: {0}")]
    Frame(#[from] PolarsError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub bar: Candle,
    pub regime: MarketRegime,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub adx: f64,
    pub atr: f64,
    pub rsi: f64,
}

impl FeatureRow {
    fn one_hot(&self, regime: MarketRegime) -> i32 {
        i32::from(self.regime == regime)
    }

    pub fn features(&self) -> [f32; 11] {
        [
            self.bar.volume as f32,
            self.ema_fast as f32,
            self.ema_slow as f32,
            self.adx as f32,
            self.atr as f32,
            self.rsi as f32,
            self.one_hot(MarketRegime::BullishTrend) as f32,
            self.one_hot(MarketRegime::BearishTrend) as f32,
            self.one_hot(MarketRegime::SidewaysQuiet) as f32,
            self.one_hot(MarketRegime::SidewaysChoppy) as f32,
            self.one_hot(MarketRegime::Unknown) as f32,
        ]
    }
}

/// Intraday bars of one asset joined with the regime of their calendar
/// date. Only bars with every indicator present are kept.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    rows: Vec<FeatureRow>,
}

impl FeatureSet {
    pub fn build(candles: &[Candle], regimes: &RegimeLookup) -> Result<Self, IndicatorError> {
        indicators::validate(candles)?;

        let closes = indicators::closes(candles);
        let ema_fast = indicators::ema(&closes, 50)?;
        let ema_slow = indicators::ema(&closes, 200)?;
        let adx = indicators::adx(candles, 14)?;
        let atr = indicators::atr(candles, 14)?;
        let rsi = indicators::rsi(&closes, 14)?;

        let rows = candles
            .iter()
            .enumerate()
            .filter_map(|(i, bar)| {
                Some(FeatureRow {
                    bar: bar.clone(),
                    regime: regimes.regime_on(bar.date()),
                    ema_fast: ema_fast[i]?,
                    ema_slow: ema_slow[i]?,
                    adx: adx[i]?,
                    atr: atr[i]?,
                    rsi: rsi[i]?,
                })
            })
            .collect();

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The most recent `n` rows.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.rows.len().saturating_sub(n);
        Self {
            rows: self.rows[start..].to_vec(),
        }
    }

    pub fn bars(&self) -> Vec<Candle> {
        self.rows.iter().map(|r| r.bar.clone()).collect()
    }

    pub fn feature_matrix(&self) -> FeatureMatrix {
        let features: Vec<[f32; 11]> = self.rows.iter().map(FeatureRow::features).collect();
        Array2::from_shape_fn((features.len(), FEATURE_COLUMNS.len()), |(r, c)| {
            features[r][c]
        })
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let rows = &self.rows;
        let col = |f: fn(&FeatureRow) -> f64| rows.iter().map(f).collect::<Vec<f64>>();
        let hot = |regime| rows.iter().map(|r| r.one_hot(regime)).collect::<Vec<i32>>();

        df!(
            "timestamp" => rows
                .iter()
                .map(|r| r.bar.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
                .collect::<Vec<_>>(),
            "open" => col(|r| r.bar.open),
            "high" => col(|r| r.bar.high),
            "low" => col(|r| r.bar.low),
            "close" => col(|r| r.bar.close),
            "volume" => col(|r| r.bar.volume),
            "ema_50" => col(|r| r.ema_fast),
            "ema_200" => col(|r| r.ema_slow),
            "adx_14" => col(|r| r.adx),
            "atr_14" => col(|r| r.atr),
            "rsi_14" => col(|r| r.rsi),
            "regime_bullish_trend" => hot(MarketRegime::BullishTrend),
            "regime_bearish_trend" => hot(MarketRegime::BearishTrend),
            "regime_sideways_quiet" => hot(MarketRegime::SidewaysQuiet),
            "regime_sideways_choppy" => hot(MarketRegime::SidewaysChoppy),
            "regime_unknown" => hot(MarketRegime::Unknown),
        )
    }

    /// Writes `<dir>/asset_<id>_ml_data_final.csv`, replacing any earlier
    /// export, and returns its path.
    pub fn write_csv(&self, dir: &Path, asset_id: i64) -> Result<PathBuf, FeatureError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("asset_{}_ml_data_final.csv", asset_id));

        let mut df = self.to_dataframe()?;
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::fixtures::hourly;

    fn rising(len: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..len).map(|i| 1.1 + i as f64 * 0.0001).collect();
        hourly(&closes)
    }

    #[test]
    fn test_warmup_rows_are_dropped() {
        let candles = rising(250);
        let set = FeatureSet::build(&candles, &RegimeLookup::default()).unwrap();

        assert_eq!(set.len(), 51);
        assert_eq!(set.rows()[0].bar, candles[199]);
        assert!(set.rows().iter().all(|r| r.regime == MarketRegime::Unknown));
    }

    #[test]
    fn test_matrix_excludes_prices_and_one_hot_encodes_regime() {
        let candles = rising(230);
        let regimes = RegimeLookup::new(
            candles
                .iter()
                .map(|c| (c.date(), MarketRegime::SidewaysQuiet))
                .collect(),
        );
        let set = FeatureSet::build(&candles, &regimes).unwrap();
        let matrix = set.feature_matrix();

        assert_eq!(matrix.dim(), (31, FEATURE_COLUMNS.len()));
        let first = matrix.row(0);
        assert_eq!(first[0], 1000.0);
        assert_eq!(first[8], 1.0);
        assert_eq!(first.iter().skip(6).sum::<f32>(), 1.0);
    }

    #[test]
    fn test_tail_keeps_most_recent_rows() {
        let candles = rising(260);
        let set = FeatureSet::build(&candles, &RegimeLookup::default()).unwrap();
        let recent = set.tail(10);

        assert_eq!(recent.len(), 10);
        assert_eq!(recent.bars().last(), candles.last());
        assert_eq!(set.tail(1000).len(), set.len());
    }

    #[test]
    fn test_csv_export_has_every_column() {
        let candles = rising(210);
        let set = FeatureSet::build(&candles, &RegimeLookup::default()).unwrap();

        let df = set.to_dataframe().unwrap();
        assert_eq!(df.height(), 11);
        // timestamp and OHLC on top of the model columns
        assert_eq!(df.width(), 5 + FEATURE_COLUMNS.len());

        let dir = std::env::temp_dir().join(format!("features-{}", std::process::id()));
        let path = set.write_csv(&dir, 7).unwrap();
        assert!(path.ends_with("asset_7_ml_data_final.csv"));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("timestamp,open,high,low,close,volume,ema_50"));
        assert_eq!(text.lines().count(), 12);
        fs::remove_dir_all(&dir).ok();
    }
}
