use common::models::Asset;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::repositories::AssetRepository;

/// Symbol → asset cache in front of the `assets` table. Misses are not
/// cached so assets seeded mid-run become visible.
#[derive(Clone)]
pub struct AssetManager {
    cache: Arc<Mutex<HashMap<String, Asset>>>,
}

impl AssetManager {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, pool: &SqlitePool, symbol: &str) -> Result<Option<Asset>, sqlx::Error> {
        {
            let cache = self.cache.lock().await;
            if let Some(asset) = cache.get(symbol) {
                return Ok(Some(asset.clone()));
            }
        }

        let found = AssetRepository::by_symbol(pool, symbol).await?;

        if let Some(ref asset) = found {
            let mut cache = self.cache.lock().await;
            cache.insert(symbol.to_string(), asset.clone());
        }
        Ok(found)
    }

    #[cfg(test)]
    async fn get_cache(&self, symbol: &str) -> Option<Asset> {
        let cache = self.cache.lock().await;
        cache.get(symbol).cloned()
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::fixtures::seeded_pool;

    #[tokio::test]
    async fn test_hit_is_cached_miss_is_not() {
        let pool = seeded_pool().await;
        let manager = AssetManager::new();

        assert!(manager.get(&pool, "USD_JPY").await.unwrap().is_none());
        assert!(manager.get_cache("USD_JPY").await.is_none());

        AssetRepository::ensure_assets(&pool, &[("USD_JPY", "Forex")]).await.unwrap();
        let jpy = manager.get(&pool, "USD_JPY").await.unwrap().unwrap();
        assert_eq!(manager.get_cache("USD_JPY").await, Some(jpy));
    }
}
