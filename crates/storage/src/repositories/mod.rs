pub mod assets_repo;
pub mod candles_repo;
pub mod regimes_repo;
pub mod signals_repo;

pub use assets_repo::AssetRepository;
pub use candles_repo::CandleRepository;
pub use regimes_repo::RegimeRepository;
pub use signals_repo::SignalRepository;

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use common::models::{Candle, Granularity};
    use sqlx::SqlitePool;

    use super::AssetRepository;
    use crate::db::connect_in_memory;

    /// In-memory store seeded with EUR_USD (id 1) and GBP_USD (id 2).
    pub async fn seeded_pool() -> SqlitePool {
        let pool = connect_in_memory().await.unwrap();
        AssetRepository::ensure_assets(&pool, &[("EUR_USD", "Forex"), ("GBP_USD", "Forex")])
            .await
            .unwrap();
        pool
    }

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    pub fn candle(asset_id: i64, hours: i64, granularity: Granularity, close: f64) -> Candle {
        Candle {
            asset_id,
            timestamp: t0() + Duration::hours(hours),
            granularity,
            open: close - 0.001,
            high: close + 0.002,
            low: close - 0.002,
            close,
            volume: 100.0,
        }
    }
}
