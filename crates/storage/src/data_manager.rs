use async_trait::async_trait;
use chrono::NaiveDate;
use common::error::StoreError;
use common::models::{Asset, Candle, DailyRegimeRecord, Granularity, MarketRegime, Signal};
use common::traits::{AssetCatalog, CandleSource, InsertSummary, RegimeStore, SignalStore};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::time::Duration;

use crate::asset_manager::AssetManager;
use crate::db;
use crate::error::map_sqlx;
use crate::repositories::{AssetRepository, CandleRepository, RegimeRepository, SignalRepository};

/// Store facade the pipeline talks to. Every write goes through a
/// repository that scopes its own transaction.
pub struct DataManager {
    pool: SqlitePool,
    asset_manager: AssetManager,
}

impl DataManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            asset_manager: AssetManager::new(),
        }
    }

    pub async fn connect(database_url: &str, busy_timeout: Duration) -> Result<Self, StoreError> {
        let pool = db::connect(database_url, busy_timeout)
            .await
            .map_err(map_sqlx)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AssetCatalog for DataManager {
    async fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        AssetRepository::list(&self.pool).await.map_err(map_sqlx)
    }

    async fn asset_by_symbol(&self, symbol: &str) -> Result<Option<Asset>, StoreError> {
        self.asset_manager
            .get(&self.pool, symbol)
            .await
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl CandleSource for DataManager {
    async fn fetch_candles(
        &self,
        asset_id: i64,
        granularity: Granularity,
        limit: Option<u32>,
    ) -> Result<Vec<Candle>, StoreError> {
        CandleRepository::fetch(&self.pool, asset_id, granularity, limit)
            .await
            .map_err(map_sqlx)
    }

    async fn fetch_latest_candles(
        &self,
        asset_id: i64,
        granularity: Granularity,
        limit: Option<u32>,
    ) -> Result<Vec<Candle>, StoreError> {
        CandleRepository::fetch_latest(&self.pool, asset_id, granularity, limit)
            .await
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl RegimeStore for DataManager {
    async fn replace_all(
        &self,
        asset_id: i64,
        records: &[DailyRegimeRecord],
    ) -> Result<usize, StoreError> {
        RegimeRepository::replace_all(&self.pool, asset_id, records)
            .await
            .map_err(map_sqlx)
    }

    async fn regime_map(
        &self,
        asset_id: i64,
    ) -> Result<HashMap<NaiveDate, MarketRegime>, StoreError> {
        RegimeRepository::fetch_map(&self.pool, asset_id)
            .await
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl SignalStore for DataManager {
    async fn insert_if_absent(
        &self,
        asset_id: i64,
        signals: &[Signal],
    ) -> Result<InsertSummary, StoreError> {
        SignalRepository::insert_if_absent(&self.pool, asset_id, signals)
            .await
            .map_err(map_sqlx)
    }
}
