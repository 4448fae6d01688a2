use common::config::{PipelineConfig, StrategyKind};
use common::error::PipelineError;
use common::models::{Asset, Granularity, Signal};
use common::traits::{CandleSource, InsertSummary, RegimeStore, SignalStore};
use std::sync::Arc;
use strategy::signals::{RangeMeanReversionStrategy, TrendFollowingStrategy};
use strategy::{RegimeLookup, RiskProfile, SignalStrategy};
use tracing::{Instrument, debug, info, info_span, warn};

use super::StageReport;

pub struct SignalService<S> {
    store: Arc<S>,
    strategies: Vec<Box<dyn SignalStrategy>>,
    granularity: Granularity,
    limit: Option<u32>,
    risk: RiskProfile,
}

impl<S> SignalService<S>
where
    S: CandleSource + RegimeStore + SignalStore,
{
    pub fn new(store: Arc<S>, granularity: Granularity, limit: Option<u32>) -> Self {
        Self {
            store,
            strategies: Vec::new(),
            granularity,
            limit,
            risk: RiskProfile::default(),
        }
    }

    pub fn with_risk(mut self, risk: RiskProfile) -> Self {
        self.risk = risk;
        self
    }

    pub fn from_config(store: Arc<S>, config: &PipelineConfig) -> Self {
        config.strategies.iter().fold(
            Self::new(store, config.intraday_granularity, config.intraday_limit).with_risk(
                RiskProfile {
                    balance: config.account_balance,
                    risk_per_trade: config.risk_per_trade,
                    pip_value: config.pip_value,
                },
            ),
            |service, kind| match kind {
                StrategyKind::Trend => service.with_strategy(TrendFollowingStrategy::default()),
                StrategyKind::Range => service.with_strategy(RangeMeanReversionStrategy::default()),
            },
        )
    }

    pub fn with_strategy(mut self, strategy: impl SignalStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub async fn run(&self, assets: &[Asset]) -> StageReport {
        let mut report = StageReport::default();
        for asset in assets {
            let span = info_span!("asset", symbol = %asset.symbol);
            let result = self.generate(asset).instrument(span).await;
            report.record("signals", asset, &result);
        }
        info!(
            "Signal stage done: {} ok, {} skipped, {} failed",
            report.succeeded, report.skipped, report.failed
        );
        report
    }

    pub async fn generate(&self, asset: &Asset) -> Result<InsertSummary, PipelineError> {
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
        if regimes.is_empty() {
            warn!(
                "{}: no daily regimes stored, every bar reads UNKNOWN and nothing will trigger",
                asset.symbol
            );
        }

        let mut signals: Vec<Signal> = Vec::new();
        for strategy in &self.strategies {
            let before = signals.len();
            signals.extend(strategy.generate(&candles, &regimes)?);
            debug!(
                "{}: {} produced {} signals",
                asset.symbol,
                strategy.name(),
                signals.len() - before
            );
        }

        self.log_sizing(&asset.symbol, &signals);

        let summary = self.store.insert_if_absent(asset.asset_id, &signals).await?;
        info!(
            "{}: {} bars scanned, {} new signals, {} already recorded",
            asset.symbol,
            candles.len(),
            summary.inserted,
            summary.already_recorded
        );
        Ok(summary)
    }

    /// Logs stop distance and position size of every signal carrying a stop.
    /// Returns how many were sized.
    fn log_sizing(&self, symbol: &str, signals: &[Signal]) -> usize {
        signals
            .iter()
            .filter_map(|signal| {
                let sizing = self.risk.size(signal, symbol)?;
                debug!(
                    "{}: {:?} at {:.5} ({}), stop {:.1} pips, size {:.2}",
                    symbol,
                    signal.side,
                    signal.entry_price,
                    signal.timestamp,
                    sizing.stop_pips,
                    sizing.units
                );
                Some(sizing)
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MockStore, asset, flat_hourly};
    use common::error::StoreError;
    use common::models::{MarketRegime, Side};
    use std::collections::HashMap;

    /// Emits one BUY on the last bar of every series it sees.
    struct LastBar;

    impl SignalStrategy for LastBar {
        fn name(&self) -> &'static str {
            "Last_Bar_Test"
        }

        fn description(&self) -> &'static str {
            "buys the last bar"
        }

        fn generate<'a>(
            &'a self,
            candles: &'a [common::models::Candle],
            _regimes: &'a RegimeLookup,
        ) -> Result<Box<dyn Iterator<Item = Signal> + 'a>, common::error::IndicatorError> {
            Ok(Box::new(candles.last().into_iter().map(|bar| Signal {
                asset_id: bar.asset_id,
                timestamp: bar.timestamp,
                side: Side::Buy,
                entry_price: bar.close,
                stop_loss: None,
                take_profit: None,
                strength: 1.0,
                strategy: self.name().to_string(),
            })))
        }
    }

    #[tokio::test]
    async fn test_signals_are_stored_once_per_run() {
        let mut store = MockStore::new();
        store
            .expect_fetch_candles()
            .withf(|_, g, limit| *g == Granularity::H1 && *limit == Some(5000))
            .returning(|id, _, _| Ok(flat_hourly(id, 240)));
        store.expect_regime_map().returning(|_| Ok(HashMap::new()));
        store
            .expect_insert_if_absent()
            .withf(|id, signals| *id == 1 && signals.len() == 1)
            .times(1)
            .returning(|_, signals| {
                Ok(InsertSummary {
                    inserted: signals.len(),
                    already_recorded: 0,
                })
            });

        let service =
            SignalService::new(Arc::new(store), Granularity::H1, Some(5000)).with_strategy(LastBar);
        let summary = service.generate(&asset(1, "EUR_USD")).await.unwrap();
        assert_eq!(summary.inserted, 1);
    }

    #[tokio::test]
    async fn test_unknown_regime_yields_no_trend_signals() {
        let mut store = MockStore::new();
        store
            .expect_fetch_candles()
            .returning(|id, _, _| Ok(flat_hourly(id, 300)));
        store.expect_regime_map().returning(|_| Ok(HashMap::new()));
        store
            .expect_insert_if_absent()
            .withf(|_, signals| signals.is_empty())
            .returning(|_, _| Ok(InsertSummary::default()));

        let service = SignalService::new(Arc::new(store), Granularity::H1, None)
            .with_strategy(TrendFollowingStrategy::default());
        let summary = service.generate(&asset(1, "EUR_USD")).await.unwrap();
        assert_eq!(summary, InsertSummary::default());
    }

    #[tokio::test]
    async fn test_short_series_skips_the_write() {
        let mut store = MockStore::new();
        store
            .expect_fetch_candles()
            .returning(|id, _, _| Ok(flat_hourly(id, 50)));
        store.expect_regime_map().returning(|_| {
            Ok(HashMap::from([(
                chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
                MarketRegime::BullishTrend,
            )]))
        });
        store.expect_insert_if_absent().never();

        let service = SignalService::new(Arc::new(store), Granularity::H1, None)
            .with_strategy(TrendFollowingStrategy::default());
        let err = service.generate(&asset(1, "EUR_USD")).await.unwrap_err();
        assert!(matches!(err, PipelineError::IndicatorComputation(_)));
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_asset() {
        let mut store = MockStore::new();
        store.expect_fetch_candles().returning(|id, _, _| match id {
            1 => Ok(Vec::new()),
            2 => Err(StoreError::Connectivity("busy".into())),
            _ => Ok(flat_hourly(id, 240)),
        });
        store.expect_regime_map().returning(|_| Ok(HashMap::new()));
        store
            .expect_insert_if_absent()
            .withf(|id, _| *id == 3)
            .times(1)
            .returning(|_, _| {
                Ok(InsertSummary {
                    inserted: 0,
                    already_recorded: 1,
                })
            });

        let service =
            SignalService::new(Arc::new(store), Granularity::H1, None).with_strategy(LastBar);
        let report = service
            .run(&[
                asset(1, "EUR_USD"),
                asset(2, "GBP_USD"),
                asset(3, "USD_JPY"),
            ])
            .await;

        assert_eq!(
            report,
            StageReport {
                succeeded: 1,
                skipped: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_only_signals_with_stops_are_sized() {
        let service = SignalService::new(Arc::new(MockStore::new()), Granularity::H1, None)
            .with_risk(RiskProfile {
                balance: 5_000.0,
                risk_per_trade: 0.02,
                pip_value: 1.0,
            });
        let bars = flat_hourly(3, 2);
        let mut signals: Vec<Signal> = LastBar
            .generate(&bars, &RegimeLookup::default())
            .unwrap()
            .collect();
        assert_eq!(service.log_sizing("USD_JPY", &signals), 0);

        signals[0].stop_loss = Some(signals[0].entry_price - 0.30);
        assert_eq!(service.log_sizing("USD_JPY", &signals), 1);
    }
}
