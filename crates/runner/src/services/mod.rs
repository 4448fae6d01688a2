pub mod feature_service;
pub mod prediction_service;
pub mod regime_service;
pub mod signal_service;

use common::error::PipelineError;
use common::models::Asset;
use tracing::{debug, error, warn};

/// Per-stage tally across assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageReport {
    /// Logs the outcome of one asset at the level its error class calls for
    /// and counts it. Nothing here stops the loop over assets.
    pub fn record<T>(&mut self, stage: &str, asset: &Asset, result: &Result<T, PipelineError>) {
        let Err(err) = result else {
            self.succeeded += 1;
            return;
        };

        match err {
            PipelineError::DataUnavailable { .. } => {
                warn!("[{}] {} skipped: {}", stage, asset.symbol, err);
                self.skipped += 1;
            }
            PipelineError::PersistenceConflict(_) => {
                debug!("[{}] {}: {}", stage, asset.symbol, err);
                self.succeeded += 1;
            }
            _ => {
                error!("[{}] {} failed: {}", stage, asset.symbol, err);
                self.failed += 1;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::asset;
    use super::*;
    use common::error::IndicatorError;
    use common::models::Granularity;

    #[test]
    fn test_report_classifies_outcomes() {
        let eur = asset(1, "EUR_USD");
        let mut report = StageReport::default();

        report.record::<()>("regimes", &eur, &Ok(()));
        report.record::<()>(
            "regimes",
            &eur,
            &Err(PipelineError::DataUnavailable {
                asset_id: 1,
                granularity: Granularity::Daily,
            }),
        );
        report.record::<()>(
            "regimes",
            &eur,
            &Err(PipelineError::PersistenceConflict("signals(1, 0)".into())),
        );
        report.record::<()>(
            "regimes",
            &eur,
            &Err(IndicatorError::NonFinite { index: 3 }.into()),
        );

        assert_eq!(
            report,
            StageReport {
                succeeded: 2,
                skipped: 1,
                failed: 1
            }
        );
    }
}
