use common::config::PipelineConfig;
use common::error::StoreError;
use common::models::Asset;
use common::traits::AssetCatalog;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Regimes,
    Signals,
    Features,
    Predict,
    All,
}

impl Stage {
    /// Regimes come first so the later stages see a fresh lookup.
    pub const ORDER: [Stage; 4] = [Stage::Regimes, Stage::Signals, Stage::Features, Stage::Predict];

    pub fn includes(&self, stage: Stage) -> bool {
        *self == Stage::All || *self == stage
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "regimes" => Ok(Self::Regimes),
            "signals" => Ok(Self::Signals),
            "features" => Ok(Self::Features),
            "predict" => Ok(Self::Predict),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown stage {:?} (expected regimes, signals, features, predict or all)",
                other
            )),
        }
    }
}

/// Assets named in `TRACKED_SYMBOLS`, or every asset when it is unset.
/// Unknown symbols are reported and left out.
pub async fn select_assets<C>(catalog: &C, config: &PipelineConfig) -> Result<Vec<Asset>, StoreError>
where
    C: AssetCatalog + ?Sized,
{
    let Some(symbols) = &config.tracked_symbols else {
        return catalog.list_assets().await;
    };

    let mut assets = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match catalog.asset_by_symbol(symbol).await? {
            Some(asset) => assets.push(asset),
            None => warn!("Tracked symbol {} is not in the asset table, skipping", symbol),
        }
    }
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MockStore, asset};

    fn config(tracked: Option<&str>) -> PipelineConfig {
        PipelineConfig::from_lookup(|key: &str| match key {
            "WORKDIR" => Some("/tmp/forex".to_string()),
            "TRACKED_SYMBOLS" => tracked.map(str::to_string),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_stage_parsing_and_inclusion() {
        assert_eq!("Signals".parse::<Stage>().unwrap(), Stage::Signals);
        assert!("backtest".parse::<Stage>().is_err());

        assert!(Stage::All.includes(Stage::Predict));
        assert!(Stage::Regimes.includes(Stage::Regimes));
        assert!(!Stage::Regimes.includes(Stage::Signals));
    }

    #[tokio::test]
    async fn test_untracked_config_takes_every_asset() {
        let mut store = MockStore::new();
        store
            .expect_list_assets()
            .times(1)
            .returning(|| Ok(vec![asset(1, "EUR_USD"), asset(2, "GBP_USD")]));
        store.expect_asset_by_symbol().never();

        let assets = select_assets(&store, &config(None)).await.unwrap();
        assert_eq!(assets.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tracked_symbol_is_left_out() {
        let mut store = MockStore::new();
        store.expect_list_assets().never();
        store.expect_asset_by_symbol().returning(|symbol| {
            Ok((symbol == "USD_JPY").then(|| asset(3, "USD_JPY")))
        });

        let assets = select_assets(&store, &config(Some("usd_jpy, AUD_NZD")))
            .await
            .unwrap();
        assert_eq!(assets, vec![asset(3, "USD_JPY")]);
    }
}
