//! Bybit spot REST source

use super::http::{build_client, get_json};
use super::{
    BucketWidth, Candle, CatalogMarket, MarketCatalog, MarketDataSource, MarketSource, SourceError,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Bybit REST base URL
pub const BYBIT_API_URL: &str = "https://api.bybit.com";

/// retCode for exceeded request frequency
const RATE_LIMIT_CODE: i64 = 10006;

/// Bybit v5 response envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<ListResult<T>>,
}

#[derive(Debug, Deserialize)]
struct ListResult<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
}

impl<T> Envelope<T> {
    fn into_list(self) -> Result<Vec<T>, SourceError> {
        match self.ret_code {
            0 => Ok(self.result.map(|r| r.list).unwrap_or_default()),
            RATE_LIMIT_CODE => Err(SourceError::RateLimited {
                venue: MarketSource::Bybit,
                message: self.ret_msg,
            }),
            code => Err(SourceError::Api {
                venue: MarketSource::Bybit,
                code: code.to_string(),
                message: self.ret_msg,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instrument {
    symbol: String,
    base_coin: String,
    quote_coin: String,
    status: String,
}

/// Bybit spot market data over REST
pub struct BybitSource {
    base_url: String,
    client: Client,
}

impl BybitSource {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Self::with_base_url(BYBIT_API_URL, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            base_url: base_url.into(),
            client: build_client(timeout)?,
        })
    }

    fn parse_catalog(envelope: Envelope<Instrument>) -> Result<MarketCatalog, SourceError> {
        let markets = envelope
            .into_list()?
            .into_iter()
            .filter(|i| i.status == "Trading")
            .map(|i| CatalogMarket::new(i.symbol, i.base_coin, i.quote_coin))
            .collect();
        Ok(MarketCatalog::new(MarketSource::Bybit, markets))
    }

    fn parse_klines(envelope: Envelope<Vec<Value>>) -> Result<Vec<Candle>, SourceError> {
        let mut candles = envelope
            .into_list()?
            .iter()
            .map(|row| Candle::from_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        // newest first on the wire
        candles.reverse();
        Ok(candles)
    }
}

#[async_trait]
impl MarketDataSource for BybitSource {
    fn kind(&self) -> MarketSource {
        MarketSource::Bybit
    }

    async fn fetch_catalog(&self) -> Result<MarketCatalog, SourceError> {
        let url = format!("{}/v5/market/instruments-info", self.base_url);
        tracing::debug!(url = %url, "Fetching Bybit instruments");

        let envelope: Envelope<Instrument> =
            get_json(&self.client, &url, &[("category", "spot".to_string())]).await?;
        Self::parse_catalog(envelope)
    }

    async fn fetch_candles(
        &self,
        market: &CatalogMarket,
        width: BucketWidth,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let url = format!("{}/v5/market/kline", self.base_url);
        let query = [
            ("category", "spot".to_string()),
            ("symbol", market.id.clone()),
            ("interval", width.bybit_interval()),
            ("limit", limit.min(self.kind().max_candles()).to_string()),
        ];

        let envelope: Envelope<Vec<Value>> = get_json(&self.client, &url, &query).await?;
        Self::parse_klines(envelope)
    }
}
