use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: i64,
    pub symbol: String,      // "EUR_USD"
    pub market_type: String, // "Forex" or "Crypto"
}
