use anyhow::anyhow;
use std::{env, sync::Arc, time::Duration};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use common::config::PipelineConfig;
use common::logger;
use storage::DataManager;
use storage::repositories::AssetRepository;
use strategy::{ConfidenceFilter, InferenceEngine};

use crate::pipeline::Stage;
use crate::services::feature_service::FeatureService;
use crate::services::prediction_service::PredictionService;
use crate::services::regime_service::RegimeService;
use crate::services::signal_service::SignalService;

mod pipeline;
mod services;

const SEED_ASSETS: &[(&str, &str); 4] = &[
    ("EUR_USD", "Forex"),
    ("GBP_USD", "Forex"),
    ("USD_JPY", "Forex"),
    ("BTC_USD", "Crypto"),
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logger::setup_logger();
    let config = PipelineConfig::from_env()?;

    let stage = match env::args().nth(1) {
        Some(arg) => arg.parse::<Stage>().map_err(|e| anyhow!(e))?,
        None => Stage::All,
    };

    let run_id = Uuid::new_v4();
    run(config, stage)
        .instrument(info_span!("run", id = %run_id))
        .await
}

async fn run(config: PipelineConfig, stage: Stage) -> anyhow::Result<()> {
    debug!("Pipeline starting up with {:?}", config);

    let store = Arc::new(
        DataManager::connect(
            &config.database_url,
            Duration::from_secs(config.busy_timeout_secs),
        )
        .await?,
    );
    AssetRepository::ensure_assets(store.pool(), SEED_ASSETS).await?;

    let assets = pipeline::select_assets(store.as_ref(), &config).await?;
    info!("Running {:?} over {} assets", stage, assets.len());

    for step in Stage::ORDER.into_iter().filter(|s| stage.includes(*s)) {
        match step {
            Stage::Regimes => {
                RegimeService::new(store.clone()).run(&assets).await;
            }
            Stage::Signals => {
                SignalService::from_config(store.clone(), &config)
                    .run(&assets)
                    .await;
            }
            Stage::Features => {
                FeatureService::new(
                    store.clone(),
                    config.intraday_granularity,
                    config.intraday_limit,
                    config.features_dir.clone(),
                )
                .run(&assets)
                .await;
            }
            Stage::Predict => {
                PredictionService::new(
                    store.clone(),
                    InferenceEngine::new(&config.model_path),
                    ConfidenceFilter::new(config.confidence_threshold)?,
                    config.intraday_granularity,
                    config.intraday_limit,
                    config.prediction_window,
                )
                .run(&assets)
                .await;
            }
            Stage::All => {}
        }
    }

    store.close().await;
    info!("Pipeline finished");
    Ok(())
}
