use serde::{ Serialize, Deserialize };

/// Snapshot of live market data for one coin. Never mutated after creation;
/// a fresh quote replaces an expired cache entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceQuote {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price_usd: f64,
    pub change_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub as_of: i64,
    #[serde(default)]
    pub is_cached: bool,
}
