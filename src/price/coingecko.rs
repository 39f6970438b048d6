use super::{ PriceError, PriceProvider, ProviderQuote };
use async_trait::async_trait;
use log::warn;
use reqwest::{ Client as HttpClient, StatusCode, header::{ HeaderMap, HeaderValue, ACCEPT } };
use std::collections::HashMap;
use std::error::Error as StdError;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

pub struct CoinGeckoClient {
    http: HttpClient,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            headers.insert(
                "x-cg-pro-api-key",
                HeaderValue::from_str(&key).map_err(|e| format!("Invalid API key format: {}", e))?
            );
        }

        let http = HttpClient::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { http, base_url: api_url })
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoClient {
    async fn fetch_price(&self, coin_id: &str) -> Result<ProviderQuote, PriceError> {
        let url = format!("{}/simple/price", self.base_url.trim_end_matches('/'));
        let params = [
            ("ids", coin_id),
            ("vs_currencies", "usd"),
            ("include_market_cap", "true"),
            ("include_24hr_vol", "true"),
            ("include_24hr_change", "true"),
        ];

        let resp = self.http
            .get(&url)
            .query(&params)
            .send().await
            .map_err(|e| PriceError::UpstreamUnavailable(e.to_string()))?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!("CoinGecko rate limit exceeded");
            return Err(PriceError::UpstreamUnavailable("rate limit exceeded".to_string()));
        }
        if !resp.status().is_success() {
            return Err(
                PriceError::UpstreamUnavailable(format!("provider returned HTTP {}", resp.status()))
            );
        }

        let mut data: HashMap<String, ProviderQuote> = resp
            .json().await
            .map_err(|e| PriceError::UpstreamUnavailable(e.to_string()))?;

        // An unknown id comes back as 200 with the id absent from the body.
        data.remove(coin_id).ok_or_else(|| PriceError::UnknownCoin(coin_id.to_string()))
    }
}
