//! OKX spot REST source

use super::http::{build_client, get_json};
use super::{
    BucketWidth, Candle, CatalogMarket, MarketCatalog, MarketDataSource, MarketSource, SourceError,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// OKX REST base URL
pub const OKX_API_URL: &str = "https://www.okx.com";

/// Error code OKX uses for "too many requests"
const RATE_LIMIT_CODE: &str = "50011";

/// OKX response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<Vec<T>, SourceError> {
        match self.code.as_str() {
            "0" => Ok(self.data),
            RATE_LIMIT_CODE => Err(SourceError::RateLimited {
                venue: MarketSource::Okx,
                message: self.msg,
            }),
            _ => Err(SourceError::Api {
                venue: MarketSource::Okx,
                code: self.code,
                message: self.msg,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instrument {
    /// Native id, e.g. `BTC-USDT`
    inst_id: String,
    base_ccy: String,
    quote_ccy: String,
    /// `live`, `suspend`, `preopen`, ...
    state: String,
}

/// OKX spot market data over REST
pub struct OkxSource {
    base_url: String,
    client: Client,
}

impl OkxSource {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Self::with_base_url(OKX_API_URL, timeout)
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
            .into_data()?
            .into_iter()
            .filter(|i| i.state == "live")
            .map(|i| CatalogMarket::new(i.inst_id, i.base_ccy, i.quote_ccy))
            .collect();
        Ok(MarketCatalog::new(MarketSource::Okx, markets))
    }

    /// OKX returns newest first; flip to oldest first
    fn parse_candles(envelope: Envelope<Vec<Value>>) -> Result<Vec<Candle>, SourceError> {
        let mut candles = envelope
            .into_data()?
            .iter()
            .map(|row| Candle::from_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        candles.reverse();
        Ok(candles)
    }
}

#[async_trait]
impl MarketDataSource for OkxSource {
    fn kind(&self) -> MarketSource {
        MarketSource::Okx
    }

    async fn fetch_catalog(&self) -> Result<MarketCatalog, SourceError> {
        let url = format!("{}/api/v5/public/instruments", self.base_url);
        tracing::debug!(url = %url, "Fetching OKX instruments");

        let envelope: Envelope<Instrument> =
            get_json(&self.client, &url, &[("instType", "SPOT".to_string())]).await?;
        Self::parse_catalog(envelope)
    }

    async fn fetch_candles(
        &self,
        market: &CatalogMarket,
        width: BucketWidth,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let max = MarketSource::Okx.max_candles();
        if limit > max {
            tracing::debug!(limit, max, "OKX candle request capped");
        }
        let url = format!("{}/api/v5/market/candles", self.base_url);
        let query = [
            ("instId", market.id.clone()),
            ("bar", width.okx_bar()),
            ("limit", limit.min(max).to_string()),
        ];

        let envelope: Envelope<Vec<Value>> = get_json(&self.client, &url, &query).await?;
        Self::parse_candles(envelope)
    }
}
