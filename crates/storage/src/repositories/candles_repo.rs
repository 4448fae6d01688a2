use chrono::DateTime;
use common::models::{Candle, Granularity};
use sqlx::SqlitePool;

pub struct CandleRepository;

#[derive(sqlx::FromRow)]
struct CandleRow {
    asset_id: i64,
    timestamp: i64,
    granularity: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl TryFrom<CandleRow> for Candle {
    type Error = sqlx::Error;

    fn try_from(row: CandleRow) -> Result<Self, Self::Error> {
        let timestamp = DateTime::from_timestamp_millis(row.timestamp).ok_or_else(|| {
            sqlx::Error::Decode(format!("timestamp out of range: {}", row.timestamp).into())
        })?;
        let granularity = row
            .granularity
            .parse::<Granularity>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            asset_id: row.asset_id,
            timestamp,
            granularity,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        })
    }
}

impl CandleRepository {
    /// Writes candles with MERGE semantics: a row with the same
    /// (asset_id, timestamp, granularity) gets its OHLCV refreshed, anything
    /// else is inserted.
    pub async fn upsert_batch(pool: &SqlitePool, candles: &[Candle]) -> Result<(), sqlx::Error> {
        if candles.is_empty() {
            return Ok(());
        }

        let mut tx = pool.begin().await?;

        for candle in candles {
            sqlx::query(
                r#"
                    INSERT INTO market_prices (
                        asset_id, timestamp, granularity, open, high, low, close, volume
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(asset_id, timestamp, granularity) DO UPDATE SET
                        open = excluded.open,
                        high = excluded.high,
                        low = excluded.low,
                        close = excluded.close,
                        volume = excluded.volume
                "#,
            )
            .bind(candle.asset_id)
            .bind(candle.timestamp.timestamp_millis())
            .bind(candle.granularity.as_str())
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Oldest-first candles of one asset and granularity, capped at `limit`.
    pub async fn fetch(
        pool: &SqlitePool,
        asset_id: i64,
        granularity: Granularity,
        limit: Option<u32>,
    ) -> Result<Vec<Candle>, sqlx::Error> {
        // LIMIT -1 is unbounded in SQLite
        let limit = limit.map(i64::from).unwrap_or(-1);

        let rows = sqlx::query_as::<_, CandleRow>(
            r#"
                SELECT asset_id, timestamp, granularity, open, high, low, close, volume
                FROM market_prices
                WHERE asset_id = ? AND granularity = ?
                ORDER BY timestamp ASC
                LIMIT ?
            "#,
        )
        .bind(asset_id)
        .bind(granularity.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Candle::try_from).collect()
    }

    /// The newest `limit` candles, returned oldest first.
    pub async fn fetch_latest(
        pool: &SqlitePool,
        asset_id: i64,
        granularity: Granularity,
        limit: Option<u32>,
    ) -> Result<Vec<Candle>, sqlx::Error> {
        let limit = limit.map(i64::from).unwrap_or(-1);

        let rows = sqlx::query_as::<_, CandleRow>(
            r#"
                SELECT * FROM (
                    SELECT asset_id, timestamp, granularity, open, high, low, close, volume
                    FROM market_prices
                    WHERE asset_id = ? AND granularity = ?
                    ORDER BY timestamp DESC
                    LIMIT ?
                )
                ORDER BY timestamp ASC
            "#,
        )
        .bind(asset_id)
        .bind(granularity.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Candle::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::fixtures::{candle, seeded_pool};

    #[tokio::test]
    async fn test_fetch_is_ascending_and_filtered() {
        let pool = seeded_pool().await;
        let batch = vec![
            candle(1, 2, Granularity::H1, 1.12),
            candle(1, 0, Granularity::H1, 1.10),
            candle(1, 1, Granularity::H1, 1.11),
            candle(1, 0, Granularity::Daily, 1.10),
            candle(2, 0, Granularity::H1, 1.27),
        ];
        CandleRepository::upsert_batch(&pool, &batch).await.unwrap();

        let h1 = CandleRepository::fetch(&pool, 1, Granularity::H1, None).await.unwrap();
        let closes: Vec<f64> = h1.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![1.10, 1.11, 1.12]);
        assert!(h1.iter().all(|c| c.granularity == Granularity::H1 && c.asset_id == 1));

        let limited = CandleRepository::fetch(&pool, 1, Granularity::H1, Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].close, 1.10);
    }

    #[tokio::test]
    async fn test_fetch_latest_keeps_newest_in_ascending_order() {
        let pool = seeded_pool().await;
        let batch: Vec<Candle> = (0..5)
            .map(|h| candle(1, h, Granularity::H1, 1.10 + h as f64 * 0.01))
            .collect();
        CandleRepository::upsert_batch(&pool, &batch).await.unwrap();

        let latest = CandleRepository::fetch_latest(&pool, 1, Granularity::H1, Some(2))
            .await
            .unwrap();
        assert_eq!(latest, batch[3..].to_vec());

        let all = CandleRepository::fetch_latest(&pool, 1, Granularity::H1, None)
            .await
            .unwrap();
        assert_eq!(all, batch);
    }

    #[tokio::test]
    async fn test_upsert_refreshes_existing_key() {
        let pool = seeded_pool().await;
        CandleRepository::upsert_batch(&pool, &[candle(1, 0, Granularity::H1, 1.10)])
            .await
            .unwrap();
        CandleRepository::upsert_batch(&pool, &[candle(1, 0, Granularity::H1, 1.15)])
            .await
            .unwrap();

        let rows = CandleRepository::fetch(&pool, 1, Granularity::H1, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, 1.15);
    }

    #[tokio::test]
    async fn test_unknown_asset_is_empty_not_error() {
        let pool = seeded_pool().await;
        let rows = CandleRepository::fetch(&pool, 99, Granularity::Daily, None).await.unwrap();
        assert!(rows.is_empty());
    }
}
