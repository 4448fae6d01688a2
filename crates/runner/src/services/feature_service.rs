use common::error::{IndicatorError, PipelineError};
use common::models::{Asset, Granularity};
use common::traits::{CandleSource, RegimeStore};
use std::path::PathBuf;
use std::sync::Arc;
use strategy::signals::SIGNAL_WARMUP;
use strategy::{FeatureSet, RegimeLookup};
use tracing::{Instrument, info, info_span};

use super::StageReport;

/// Exports the model-ready dataset of each asset as CSV.
pub struct FeatureService<S> {
    store: Arc<S>,
    granularity: Granularity,
    limit: Option<u32>,
    out_dir: PathBuf,
}

impl<S> FeatureService<S>
where
    S: CandleSource + RegimeStore,
{
    pub fn new(
        store: Arc<S>,
        granularity: Granularity,
        limit: Option<u32>,
        out_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            granularity,
            limit,
            out_dir,
        }
    }

    pub async fn run(&self, assets: &[Asset]) -> StageReport {
        let mut report = StageReport::default();
        for asset in assets {
            let span = info_span!("asset", symbol = %asset.symbol);
            let result = self.export(asset).instrument(span).await;
            report.record("features", asset, &result);
        }
        info!(
            "Feature stage done: {} ok, {} skipped, {} failed",
            report.succeeded, report.skipped, report.failed
        );
        report
    }

    pub async fn export(&self, asset: &Asset) -> Result<PathBuf, PipelineError> {
        let candles = self
            .store
            .fetch_candles(asset.asset_id, self.granularity, self.limit)
            .await?;
        if candles.is_empty() {
            return Err(PipelineError::DataUnavailable {
                asset_id: asset.asset_id,
                granularity: self.granularity,
            });
        }

        let regimes = RegimeLookup::new(self.store.regime_map(asset.asset_id).await?);
        let set = FeatureSet::build(&candles, &regimes)?;
        if set.is_empty() {
            return Err(IndicatorError::InsufficientHistory {
                required: SIGNAL_WARMUP,
                available: candles.len(),
            }
            .into());
        }

        let path = set
            .write_csv(&self.out_dir, asset.asset_id)
            .map_err(|e| PipelineError::Export(e.to_string()))?;
        info!("{}: {} rows exported to {:?}", asset.symbol, set.len(), path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MockStore, asset, flat_hourly};
    use chrono::NaiveDate;
    use common::models::MarketRegime;
    use std::collections::HashMap;
    use std::fs;

    fn out_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_export_writes_one_csv_per_asset() {
        let mut store = MockStore::new();
        store
            .expect_fetch_candles()
            .returning(|id, _, _| Ok(flat_hourly(id, 230)));
        store.expect_regime_map().returning(|_| {
            Ok(HashMap::from([(
                NaiveDate::from_ymd_opt(2023, 1, 10).unwrap(),
                MarketRegime::SidewaysQuiet,
            )]))
        });

        let dir = out_dir("feature-export");
        let service = FeatureService::new(Arc::new(store), Granularity::H1, None, dir.clone());
        let path = service.export(&asset(4, "BTC_USD")).await.unwrap();

        assert_eq!(path, dir.join("asset_4_ml_data_final.csv"));
        let text = fs::read_to_string(&path).unwrap();
        // header plus bars 199..230
        assert_eq!(text.lines().count(), 32);
        assert!(text.lines().next().unwrap().ends_with("regime_unknown"));
        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_intraday_data_is_skipped() {
        let mut store = MockStore::new();
        store.expect_fetch_candles().returning(|_, _, _| Ok(Vec::new()));
        store.expect_regime_map().never();

        let service =
            FeatureService::new(Arc::new(store), Granularity::H4, None, out_dir("feature-none"));
        let report = service.run(&[asset(1, "EUR_USD")]).await;
        assert_eq!(report.skipped, 1);
    }
}
