//! CoinGecko client for universe discovery
//!
//! Pulls the top assets by market cap from `/coins/markets`. Symbols are
//! uppercased and used as canonical tickers.

use super::{Asset, UniverseSource};
use crate::config::{UniverseConfig, COINGECKO_API_URL};
use crate::market::http::{build_client, get_json};
use crate::market::SourceError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the CoinGecko client
#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    /// Base URL for the CoinGecko API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Number of top assets to request
    pub size: usize,
    /// Currency used for market-cap ranking
    pub vs_currency: String,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: COINGECKO_API_URL.to_string(),
            timeout: Duration::from_secs(15),
            size: 50,
            vs_currency: "usd".to_string(),
        }
    }
}

impl CoinGeckoConfig {
    pub fn from_config(universe: &UniverseConfig, timeout: Duration) -> Self {
        Self {
            base_url: universe.base_url.trim_end_matches('/').to_string(),
            timeout,
            size: universe.size,
            vs_currency: universe.vs_currency.clone(),
        }
    }
}

/// Client for CoinGecko's public markets endpoint
pub struct CoinGeckoClient {
    config: CoinGeckoConfig,
    client: Client,
    retry: RetryPolicy,
}

impl CoinGeckoClient {
    pub fn new(config: CoinGeckoConfig, retry: RetryPolicy) -> Result<Self, SourceError> {
        let client = build_client(config.timeout)?;
        Ok(Self {
            config,
            client,
            retry,
        })
    }

    pub fn config(&self) -> &CoinGeckoConfig {
        &self.config
    }

    /// Fetch the top assets by market cap, best first
    pub async fn fetch_top(&self) -> Result<Vec<Asset>, SourceError> {
        let url = format!("{}/coins/markets", self.config.base_url);
        let query = [
            ("vs_currency", self.config.vs_currency.clone()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", self.config.size.to_string()),
            ("page", "1".to_string()),
        ];

        tracing::debug!(url = %url, size = self.config.size, "Fetching ranked universe");

        let coins: Vec<CoinGeckoCoin> = self
            .retry
            .run(
                |_| get_json(&self.client, &url, &query),
                SourceError::is_retryable,
            )
            .await?;

        let assets = to_assets(coins);
        tracing::info!(assets = assets.len(), "Fetched ranked universe");
        Ok(assets)
    }
}

#[async_trait]
impl UniverseSource for CoinGeckoClient {
    async fn fetch_universe(&self) -> anyhow::Result<Vec<Asset>> {
        Ok(self.fetch_top().await?)
    }
}

/// CoinGecko `/coins/markets` row
#[derive(Debug, Deserialize)]
struct CoinGeckoCoin {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Uppercase symbols, drop rows without one, fall back to the symbol as name
fn to_assets(coins: Vec<CoinGeckoCoin>) -> Vec<Asset> {
    coins
        .into_iter()
        .filter_map(|coin| {
            let ticker = coin.symbol?.trim().to_uppercase();
            if ticker.is_empty() {
                return None;
            }
            let name = coin
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| ticker.clone());
            Some(Asset { ticker, name })
        })
        .collect()
}
