use common::error::{IndicatorError, PipelineError};
use common::models::{Asset, Granularity, Signal};
use common::traits::{CandleSource, InsertSummary, RegimeStore, SignalStore};
use std::sync::Arc;
use strategy::signals::SIGNAL_WARMUP;
use strategy::{ConfidenceFilter, FeatureSet, ProbabilityModel, RegimeLookup};
use tracing::{Instrument, info, info_span};

use super::StageReport;

/// Scores the most recent bars of each asset with the model and stores the
/// ones the confidence filter lets through.
pub struct PredictionService<S, M> {
    store: Arc<S>,
    model: M,
    filter: ConfidenceFilter,
    granularity: Granularity,
    limit: Option<u32>,
    window: usize,
}

impl<S, M> PredictionService<S, M>
where
    S: CandleSource + RegimeStore + SignalStore,
    M: ProbabilityModel,
{
    pub fn new(
        store: Arc<S>,
        model: M,
        filter: ConfidenceFilter,
        granularity: Granularity,
        limit: Option<u32>,
        window: usize,
    ) -> Self {
        Self {
            store,
            model,
            filter,
            granularity,
            limit,
            window,
        }
    }

    pub async fn run(&self, assets: &[Asset]) -> StageReport {
        let mut report = StageReport::default();
        for asset in assets {
            let span = info_span!("asset", symbol = %asset.symbol);
            let result = self.predict(asset).instrument(span).await;
            report.record("predict", asset, &result);
        }
        info!(
            "Prediction stage done: {} ok, {} skipped, {} failed",
            report.succeeded, report.skipped, report.failed
        );
        report
    }

    /// Newest-bar fetch size: the configured limit, widened so the scored
    /// window still has a full warm-up behind it.
    fn fetch_limit(&self) -> Option<u32> {
        let needed = u32::try_from(self.window + SIGNAL_WARMUP).unwrap_or(u32::MAX);
        self.limit.map(|limit| limit.max(needed))
    }

    pub async fn predict(&self, asset: &Asset) -> Result<InsertSummary, PipelineError> {
        let candles = self
            .store
            .fetch_latest_candles(asset.asset_id, self.granularity, self.fetch_limit())
            .await?;
        if candles.is_empty() {
            return Err(PipelineError::DataUnavailable {
                asset_id: asset.asset_id,
                granularity: self.granularity,
            });
        }

        let regimes = RegimeLookup::new(self.store.regime_map(asset.asset_id).await?);
        let recent = FeatureSet::build(&candles, &regimes)?.tail(self.window);
        if recent.is_empty() {
            return Err(IndicatorError::InsufficientHistory {
                required: SIGNAL_WARMUP,
                available: candles.len(),
            }
            .into());
        }

        let probabilities = self
            .model
            .predict_proba(&recent.feature_matrix())
            .map_err(|e| PipelineError::Model(e.to_string()))?;
        if probabilities.len() != recent.len() {
            return Err(PipelineError::Model(format!(
                "{} probability rows for {} bars",
                probabilities.len(),
                recent.len()
            )));
        }

        let bars = recent.bars();
        let signals: Vec<Signal> = self.filter.apply(&bars, &probabilities).collect();
        let summary = self.store.insert_if_absent(asset.asset_id, &signals).await?;

        info!(
            "{}: {} bars scored at threshold {:.2}, {} new signals, {} already recorded",
            asset.symbol,
            recent.len(),
            self.filter.threshold(),
            summary.inserted,
            summary.already_recorded
        );
        Ok(summary)
    }
}
