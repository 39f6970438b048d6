pub mod coingecko;

use crate::cache::CacheStore;
use crate::coins;
use crate::models::price::PriceQuote;
use async_trait::async_trait;
use chrono::Utc;
use log::{ info, warn };
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("unknown coin '{0}'")] UnknownCoin(String),
    #[error("price provider unavailable: {0}")] UpstreamUnavailable(String),
}

/// Raw market data for one coin as the upstream provider reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderQuote {
    pub usd: f64,
    pub usd_market_cap: Option<f64>,
    pub usd_24h_vol: Option<f64>,
    pub usd_24h_change: Option<f64>,
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_price(&self, coin_id: &str) -> Result<ProviderQuote, PriceError>;
}

/// Cache-aside price lookup: check, fetch on miss, populate. Provider errors
/// surface as-is and never leave stale data behind; expired entries are
/// refetched rather than served.
pub struct PriceService {
    provider: Arc<dyn PriceProvider>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl PriceService {
    pub fn new(provider: Arc<dyn PriceProvider>, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { provider, cache, ttl }
    }

    pub async fn get_price(&self, query: &str) -> Result<PriceQuote, PriceError> {
        let (id, symbol, name) = match coins::lookup(query) {
            Some(entry) => (entry.id.to_string(), entry.symbol.to_string(), entry.name.to_string()),
            None => {
                let normalized = query.trim().to_lowercase();
                (normalized.clone(), normalized.to_uppercase(), normalized)
            }
        };

        let cache_key = format!("price:{}", id);
        if let Some(raw) = self.cache.get(&cache_key).await {
            match serde_json::from_str::<PriceQuote>(&raw) {
                Ok(mut quote) => {
                    info!("Price cache hit for '{}'", id);
                    quote.is_cached = true;
                    return Ok(quote);
                }
                Err(e) => {
                    warn!("Dropping malformed cached quote for '{}': {}", id, e);
                    self.cache.delete(&cache_key).await;
                }
            }
        }

        info!("Price cache miss for '{}'. Querying provider...", id);
        let fetched = self.provider.fetch_price(&id).await?;
        let quote = PriceQuote {
            id,
            symbol,
            name,
            price_usd: fetched.usd,
            change_24h: fetched.usd_24h_change,
            market_cap: fetched.usd_market_cap,
            volume_24h: fetched.usd_24h_vol,
            as_of: Utc::now().timestamp(),
            is_cached: false,
        };
        if let Ok(json) = serde_json::to_string(&quote) {
            self.cache.set(&cache_key, &json, self.ttl).await;
        }
        Ok(quote)
    }
}

/// User-facing rendering of a quote, emitted as a single content fragment.
pub fn format_quote(quote: &PriceQuote) -> String {
    let price = if quote.price_usd >= 1.0 {
        format!("${}", format_amount(quote.price_usd, 2))
    } else {
        format!("${:.6}", quote.price_usd)
    };

    let mut out = format!("💰 {} Price Update\n\n", quote.symbol);
    out.push_str(&format!("Current Price: {}\n", price));

    match quote.change_24h {
        Some(change) if change > 0.0 => {
            out.push_str(&format!("24h Change: +{:.2}% 📈\n", change));
        }
        Some(change) if change < 0.0 => {
            out.push_str(&format!("24h Change: {:.2}% 📉\n", change));
        }
        Some(_) => {
            out.push_str("24h Change: 0.00% ➡️\n");
        }
        None => {}
    }

    if let Some(cap) = quote.market_cap {
        out.push_str(&format!("Market Cap: ${}\n", format_amount(cap, 0)));
    }
    if let Some(vol) = quote.volume_24h {
        out.push_str(&format!("24h Volume: ${}\n", format_amount(vol, 0)));
    }

    out
}

/// Fixed-point with thousands separators in the integer part.
fn format_amount(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::new();
    let digits: Vec<char> = int_part.chars().collect();
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}
