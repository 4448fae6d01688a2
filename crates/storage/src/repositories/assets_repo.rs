use common::models::Asset;
use sqlx::SqlitePool;

pub struct AssetRepository;

#[derive(sqlx::FromRow)]
struct AssetRow {
    asset_id: i64,
    symbol: String,
    market_type: String,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        Self {
            asset_id: row.asset_id,
            symbol: row.symbol,
            market_type: row.market_type,
        }
    }
}

impl AssetRepository {
    /// Inserts the (symbol, market_type) pairs that are not registered yet.
    pub async fn ensure_assets(
        pool: &SqlitePool,
        assets: &[(&str, &str)],
    ) -> Result<(), sqlx::Error> {
        if assets.is_empty() {
            return Ok(());
        }
        let mut tx = pool.begin().await?;

        for &(symbol, market_type) in assets {
            sqlx::query("INSERT OR IGNORE INTO assets(symbol, market_type) VALUES (?, ?)")
                .bind(symbol)
                .bind(market_type)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<Asset>, sqlx::Error> {
        let rows = sqlx::query_as::<_, AssetRow>(
            "SELECT asset_id, symbol, market_type FROM assets ORDER BY asset_id ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(Asset::from).collect())
    }

    pub async fn by_symbol(pool: &SqlitePool, symbol: &str) -> Result<Option<Asset>, sqlx::Error> {
        let row = sqlx::query_as::<_, AssetRow>(
            "SELECT asset_id, symbol, market_type FROM assets WHERE symbol = ?",
        )
        .bind(symbol)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(Asset::from))
    }
}
