//! Binance spot REST source

use super::http::{build_client, get_json};
use super::{
    BucketWidth, Candle, CatalogMarket, MarketCatalog, MarketDataSource, MarketSource, SourceError,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Binance REST base URL
pub const BINANCE_API_URL: &str = "https://api.binance.com";

/// `exchangeInfo` response
#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    /// Native symbol, e.g. `BTCUSDT`
    symbol: String,
    /// Trading status; only `TRADING` markets are listed
    status: String,
    base_asset: String,
    quote_asset: String,
}

/// Binance spot market data over REST
pub struct BinanceSource {
    base_url: String,
    client: Client,
}

impl BinanceSource {
    /// Create a source against the public API
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Self::with_base_url(BINANCE_API_URL, timeout)
    }

    /// Create a source against a custom endpoint
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            base_url: base_url.into(),
            client: build_client(timeout)?,
        })
    }

    fn parse_catalog(info: ExchangeInfo) -> MarketCatalog {
        let markets = info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| CatalogMarket::new(s.symbol, s.base_asset, s.quote_asset))
            .collect();
        MarketCatalog::new(MarketSource::Binance, markets)
    }

    /// Klines arrive oldest first
    fn parse_klines(rows: Vec<Vec<Value>>) -> Result<Vec<Candle>, SourceError> {
        rows.iter().map(|row| Candle::from_row(row)).collect()
    }
}

#[async_trait]
impl MarketDataSource for BinanceSource {
    fn kind(&self) -> MarketSource {
        MarketSource::Binance
    }

    async fn fetch_catalog(&self) -> Result<MarketCatalog, SourceError> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        tracing::debug!(url = %url, "Fetching Binance exchange info");

        let info: ExchangeInfo = get_json(&self.client, &url, &[]).await?;
        Ok(Self::parse_catalog(info))
    }

    async fn fetch_candles(
        &self,
        market: &CatalogMarket,
        width: BucketWidth,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let query = [
            ("symbol", market.id.clone()),
            ("interval", width.binance_interval()),
            ("limit", limit.min(self.kind().max_candles()).to_string()),
        ];

        let rows: Vec<Vec<Value>> = get_json(&self.client, &url, &query).await?;
        Self::parse_klines(rows)
    }
}
