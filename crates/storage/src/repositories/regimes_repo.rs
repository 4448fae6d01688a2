use chrono::NaiveDate;
use common::models::{DailyRegimeRecord, MarketRegime};
use sqlx::SqlitePool;
use std::collections::HashMap;

pub struct RegimeRepository;

#[derive(sqlx::FromRow)]
struct RegimeRow {
    asset_id: i64,
    date: NaiveDate,
    regime: String,
    sma_50: f64,
    sma_200: f64,
    atr_14: f64,
    adx_14: f64,
    is_high_volatility: bool,
}

fn parse_regime(label: &str) -> Result<MarketRegime, sqlx::Error> {
    label
        .parse::<MarketRegime>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

impl TryFrom<RegimeRow> for DailyRegimeRecord {
    type Error = sqlx::Error;

    fn try_from(row: RegimeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            asset_id: row.asset_id,
            date: row.date,
            regime: parse_regime(&row.regime)?,
            sma_fast: row.sma_50,
            sma_slow: row.sma_200,
            atr: row.atr_14,
            adx: row.adx_14,
            high_volatility: row.is_high_volatility,
        })
    }
}

impl RegimeRepository {
    /// Full refresh of one asset's history: delete then insert, committed
    /// together so readers never observe a partial set.
    pub async fn replace_all(
        pool: &SqlitePool,
        asset_id: i64,
        records: &[DailyRegimeRecord],
    ) -> Result<usize, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM daily_regimes WHERE asset_id = ?")
            .bind(asset_id)
            .execute(&mut *tx)
            .await?;

        for record in records {
            sqlx::query(
                r#"
                    INSERT INTO daily_regimes (
                        asset_id, date, regime, sma_50, sma_200, atr_14, adx_14, is_high_volatility
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(asset_id)
            .bind(record.date)
            .bind(record.regime.as_str())
            .bind(record.sma_fast)
            .bind(record.sma_slow)
            .bind(record.atr)
            .bind(record.adx)
            .bind(record.high_volatility)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    pub async fn fetch(
        pool: &SqlitePool,
        asset_id: i64,
    ) -> Result<Vec<DailyRegimeRecord>, sqlx::Error> {
        let rows = sqlx::query_as::<_, RegimeRow>(
            r#"
                SELECT asset_id, date, regime, sma_50, sma_200, atr_14, adx_14, is_high_volatility
                FROM daily_regimes
                WHERE asset_id = ?
                ORDER BY date ASC
            "#,
        )
        .bind(asset_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(DailyRegimeRecord::try_from).collect()
    }

    pub async fn fetch_map(
        pool: &SqlitePool,
        asset_id: i64,
    ) -> Result<HashMap<NaiveDate, MarketRegime>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (NaiveDate, String)>(
            "SELECT date, regime FROM daily_regimes WHERE asset_id = ?",
        )
        .bind(asset_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter()
            .map(|(date, label)| Ok((date, parse_regime(&label)?)))
            .collect()
    }
}
