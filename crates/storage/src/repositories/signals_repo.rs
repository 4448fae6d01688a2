use chrono::{DateTime, Utc};
use common::models::{Side, Signal};
use common::traits::InsertSummary;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

pub struct SignalRepository;

#[derive(sqlx::FromRow)]
struct SignalRow {
    asset_id: i64,
    timestamp: i64,
    strategy: String,
    side: String,
    entry_price: f64,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    strength: f64,
}

impl TryFrom<SignalRow> for Signal {
    type Error = sqlx::Error;

    fn try_from(row: SignalRow) -> Result<Self, Self::Error> {
        let timestamp = DateTime::from_timestamp_millis(row.timestamp).ok_or_else(|| {
            sqlx::Error::Decode(format!("timestamp out of range: {}", row.timestamp).into())
        })?;
        let side = row
            .side
            .parse::<Side>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            asset_id: row.asset_id,
            timestamp,
            side,
            entry_price: row.entry_price,
            stop_loss: row.stop_loss,
            take_profit: row.take_profit,
            strength: row.strength,
            strategy: row.strategy,
        })
    }
}

impl SignalRepository {
    pub async fn exists(
        conn: &mut SqliteConnection,
        asset_id: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM signals WHERE asset_id = ? AND timestamp = ?",
        )
        .bind(asset_id)
        .bind(timestamp.timestamp_millis())
        .fetch_one(conn)
        .await?;
        Ok(count > 0)
    }

    pub async fn insert(conn: &mut SqliteConnection, signal: &Signal) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                INSERT INTO signals (
                    asset_id, timestamp, strategy, side, entry_price, stop_loss, take_profit,
                    strength, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(signal.asset_id)
        .bind(signal.timestamp.timestamp_millis())
        .bind(&signal.strategy)
        .bind(signal.side.as_str())
        .bind(signal.entry_price)
        .bind(signal.stop_loss)
        .bind(signal.take_profit)
        .bind(signal.strength)
        .bind(Utc::now().timestamp_millis())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Checks each (asset_id, timestamp) before inserting and skips the ones
    /// already stored. A unique violation from the backstop constraint counts
    /// as already recorded. All rows of the batch share one transaction.
    pub async fn insert_if_absent(
        pool: &SqlitePool,
        asset_id: i64,
        signals: &[Signal],
    ) -> Result<InsertSummary, sqlx::Error> {
        let mut summary = InsertSummary::default();
        if signals.is_empty() {
            return Ok(summary);
        }

        let mut tx = pool.begin().await?;

        for signal in signals {
            if signal.asset_id != asset_id {
                warn!(
                    "Skipping signal of asset {} in the batch of asset {}",
                    signal.asset_id, asset_id
                );
                continue;
            }
            if Self::exists(&mut *tx, asset_id, signal.timestamp).await? {
                summary.already_recorded += 1;
                continue;
            }

            match Self::insert(&mut *tx, signal).await {
                Ok(()) => summary.inserted += 1,
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    debug!("Signal {} @ {} already recorded", asset_id, signal.timestamp);
                    summary.already_recorded += 1;
                }
                Err(e) => return Err(e),
            }
        }
        tx.commit().await?;
        Ok(summary)
    }

    pub async fn fetch_for_asset(
        pool: &SqlitePool,
        asset_id: i64,
    ) -> Result<Vec<Signal>, sqlx::Error> {
        let rows = sqlx::query_as::<_, SignalRow>(
            r#"
                SELECT asset_id, timestamp, strategy, side, entry_price, stop_loss, take_profit, strength
                FROM signals
                WHERE asset_id = ?
                ORDER BY timestamp ASC
            "#,
        )
        .bind(asset_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Signal::try_from).collect()
    }

    /// Newest first, across all assets.
    pub async fn recent(pool: &SqlitePool, limit: u32) -> Result<Vec<Signal>, sqlx::Error> {
        let rows = sqlx::query_as::<_, SignalRow>(
            r#"
                SELECT asset_id, timestamp, strategy, side, entry_price, stop_loss, take_profit, strength
                FROM signals
                ORDER BY timestamp DESC
                LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Signal::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::fixtures::{seeded_pool, t0};
    use chrono::Duration;

    fn buy(asset_id: i64, hours: i64, entry: f64) -> Signal {
        Signal {
            asset_id,
            timestamp: t0() + Duration::hours(hours),
            side: Side::Buy,
            entry_price: entry,
            stop_loss: Some(entry - 0.006),
            take_profit: Some(entry + 0.012),
            strength: 1.0,
            strategy: "Trend_EMA_ADX_v1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_signal_twice_stores_one_row() {
        let pool = seeded_pool().await;
        let signal = buy(1, 5, 1.2);

        let first = SignalRepository::insert_if_absent(&pool, 1, &[signal.clone()]).await.unwrap();
        let second = SignalRepository::insert_if_absent(&pool, 1, &[signal.clone()]).await.unwrap();

        assert_eq!(first, InsertSummary { inserted: 1, already_recorded: 0 });
        assert_eq!(second, InsertSummary { inserted: 0, already_recorded: 1 });

        let stored = SignalRepository::fetch_for_asset(&pool, 1).await.unwrap();
        assert_eq!(stored, vec![signal]);
    }

    #[tokio::test]
    async fn test_existing_row_is_not_updated() {
        let pool = seeded_pool().await;
        SignalRepository::insert_if_absent(&pool, 1, &[buy(1, 5, 1.2)]).await.unwrap();
        SignalRepository::insert_if_absent(&pool, 1, &[buy(1, 5, 1.3)]).await.unwrap();

        let stored = SignalRepository::fetch_for_asset(&pool, 1).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].entry_price, 1.2);
    }

    #[tokio::test]
    async fn test_duplicates_within_one_batch() {
        let pool = seeded_pool().await;
        let summary =
            SignalRepository::insert_if_absent(&pool, 1, &[buy(1, 1, 1.2), buy(1, 1, 1.2), buy(1, 2, 1.21)])
                .await
                .unwrap();
        assert_eq!(summary, InsertSummary { inserted: 2, already_recorded: 1 });
    }

    #[tokio::test]
    async fn test_same_timestamp_other_asset_is_distinct() {
        let pool = seeded_pool().await;
        SignalRepository::insert_if_absent(&pool, 1, &[buy(1, 3, 1.2)]).await.unwrap();
        let summary = SignalRepository::insert_if_absent(&pool, 2, &[buy(2, 3, 1.27)]).await.unwrap();
        assert_eq!(summary.inserted, 1);

        let recent = SignalRepository::recent(&pool, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn test_model_signal_without_levels_round_trips() {
        let pool = seeded_pool().await;
        let signal = Signal {
            side: Side::Sell,
            stop_loss: None,
            take_profit: None,
            strength: 0.81,
            strategy: "Model_Confidence_v1".into(),
            ..buy(1, 7, 1.19)
        };
        SignalRepository::insert_if_absent(&pool, 1, &[signal.clone()]).await.unwrap();
        assert_eq!(SignalRepository::recent(&pool, 1).await.unwrap(), vec![signal]);
    }
}
