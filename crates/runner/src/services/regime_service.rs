use common::error::PipelineError;
use common::models::{Asset, Granularity};
use common::traits::{CandleSource, RegimeStore};
use std::sync::Arc;
use strategy::RegimeClassifier;
use tracing::{Instrument, info, info_span};

use super::StageReport;

pub struct RegimeService<S> {
    store: Arc<S>,
    classifier: RegimeClassifier,
}

impl<S> RegimeService<S>
where
    S: CandleSource + RegimeStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            classifier: RegimeClassifier::default(),
        }
    }

    pub async fn run(&self, assets: &[Asset]) -> StageReport {
        let mut report = StageReport::default();
        for asset in assets {
            let span = info_span!("asset", symbol = %asset.symbol);
            let result = self.refresh(asset).instrument(span).await;
            report.record("regimes", asset, &result);
        }
        info!(
            "Regime stage done: {} ok, {} skipped, {} failed",
            report.succeeded, report.skipped, report.failed
        );
        report
    }

    /// Reclassifies the asset's full daily history and replaces what was
    /// stored for it. On any error the stored set is left as it was.
    pub async fn refresh(&self, asset: &Asset) -> Result<usize, PipelineError> {
        let candles = self
            .store
            .fetch_candles(asset.asset_id, Granularity::Daily, None)
            .await?;
        if candles.is_empty() {
            return Err(PipelineError::DataUnavailable {
                asset_id: asset.asset_id,
                granularity: Granularity::Daily,
            });
        }

        let records: Vec<_> = self.classifier.classify_series(&candles)?.collect();
        let written = self.store.replace_all(asset.asset_id, &records).await?;

        let volatile = records.iter().filter(|r| r.high_volatility).count();
        info!(
            "{}: {} regime days written ({} high-volatility), latest {}",
            asset.symbol,
            written,
            volatile,
            records.last().map(|r| r.regime.as_str()).unwrap_or("-")
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MockStore, asset, rising_daily};
    use common::error::StoreError;
    use common::models::MarketRegime;

    #[tokio::test]
    async fn test_refresh_replaces_with_classified_days() {
        let mut store = MockStore::new();
        store
            .expect_fetch_candles()
            .withf(|id, g, limit| *id == 1 && *g == Granularity::Daily && limit.is_none())
            .returning(|id, _, _| Ok(rising_daily(id)));
        store
            .expect_replace_all()
            .withf(|id, records| {
                *id == 1
                    && records.len() == 61
                    && records.iter().all(|r| r.regime == MarketRegime::BullishTrend)
            })
            .times(1)
            .returning(|_, records| Ok(records.len()));

        let service = RegimeService::new(Arc::new(store));
        assert_eq!(service.refresh(&asset(1, "EUR_USD")).await.unwrap(), 61);
    }

    #[tokio::test]
    async fn test_empty_daily_series_is_data_unavailable() {
        let mut store = MockStore::new();
        store.expect_fetch_candles().returning(|_, _, _| Ok(Vec::new()));
        store.expect_replace_all().never();

        let service = RegimeService::new(Arc::new(store));
        let err = service.refresh(&asset(3, "USD_JPY")).await.unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable { asset_id: 3, .. }));
    }

    #[tokio::test]
    async fn test_malformed_series_keeps_stored_rows() {
        let mut store = MockStore::new();
        store.expect_fetch_candles().returning(|id, _, _| {
            let mut candles = rising_daily(id);
            candles[10].close = f64::NAN;
            Ok(candles)
        });
        store.expect_replace_all().never();

        let service = RegimeService::new(Arc::new(store));
        let err = service.refresh(&asset(1, "EUR_USD")).await.unwrap_err();
        assert!(matches!(err, PipelineError::IndicatorComputation(_)));
    }

    #[tokio::test]
    async fn test_one_failing_asset_does_not_stop_the_next() {
        let mut store = MockStore::new();
        store.expect_fetch_candles().returning(|id, _, _| match id {
            1 => Err(StoreError::Connectivity("database is locked".into())),
            _ => Ok(rising_daily(id)),
        });
        store
            .expect_replace_all()
            .withf(|id, _| *id == 2)
            .times(1)
            .returning(|_, records| Ok(records.len()));

        let service = RegimeService::new(Arc::new(store));
        let report = service
            .run(&[asset(1, "EUR_USD"), asset(2, "GBP_USD")])
            .await;

        assert_eq!(
            report,
            StageReport {
                succeeded: 1,
                skipped: 0,
                failed: 1
            }
        );
    }
}
