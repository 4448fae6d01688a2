use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::error::StoreError;
use crate::models::{Asset, Candle, DailyRegimeRecord, Granularity, MarketRegime, Signal};

#[async_trait]
pub trait AssetCatalog: Send + Sync {
    async fn list_assets(&self) -> Result<Vec<Asset>, StoreError>;

    async fn asset_by_symbol(&self, symbol: &str) -> Result<Option<Asset>, StoreError>;
}

/// Read side of the candle store.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Candles in ascending time order, oldest first, at most `limit` rows.
    /// An empty vec means "no data" and is not an error.
    async fn fetch_candles(
        &self,
        asset_id: i64,
        granularity: Granularity,
        limit: Option<u32>,
    ) -> Result<Vec<Candle>, StoreError>;

    /// The newest `limit` candles (all of them when `None`), still in
    /// ascending time order.
    async fn fetch_latest_candles(
        &self,
        asset_id: i64,
        granularity: Granularity,
        limit: Option<u32>,
    ) -> Result<Vec<Candle>, StoreError>;
}

#[async_trait]
pub trait RegimeStore: Send + Sync {
    /// Deletes every stored record of `asset_id` and inserts `records` in one
    /// transaction. Returns the number of rows written.
    async fn replace_all(
        &self,
        asset_id: i64,
        records: &[DailyRegimeRecord],
    ) -> Result<usize, StoreError>;

    async fn regime_map(&self, asset_id: i64)
    -> Result<HashMap<NaiveDate, MarketRegime>, StoreError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub inserted: usize,
    pub already_recorded: usize,
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Inserts each signal whose (asset_id, timestamp) is not stored yet.
    /// Existing rows are left untouched.
    async fn insert_if_absent(
        &self,
        asset_id: i64,
        signals: &[Signal],
    ) -> Result<InsertSummary, StoreError>;
}
