//! Market data types shared by all sources

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A configured market data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketSource {
    Binance,
    Okx,
    Bybit,
}

impl MarketSource {
    /// Every supported source, in default priority order
    pub const ALL: [MarketSource; 3] =
        [MarketSource::Binance, MarketSource::Okx, MarketSource::Bybit];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSource::Binance => "binance",
            MarketSource::Okx => "okx",
            MarketSource::Bybit => "bybit",
        }
    }

    /// Most candles one history request returns
    pub fn max_candles(&self) -> usize {
        match self {
            MarketSource::Binance | MarketSource::Bybit => 1000,
            MarketSource::Okx => 300,
        }
    }
}

impl fmt::Display for MarketSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(MarketSource::Binance),
            "okx" => Ok(MarketSource::Okx),
            "bybit" => Ok(MarketSource::Bybit),
            other => Err(format!("unknown market source: {other}")),
        }
    }
}

/// Width of one volume bucket
///
/// Restricted to the intervals every supported venue offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketWidth(u32);

impl BucketWidth {
    /// Bucket widths in minutes available on all sources
    pub const SUPPORTED_MINUTES: [u32; 11] = [1, 3, 5, 15, 30, 60, 120, 240, 360, 720, 1440];

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        Self::SUPPORTED_MINUTES
            .contains(&minutes)
            .then_some(BucketWidth(minutes))
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.0 as i64)
    }

    /// Binance kline interval (`5m`, `1h`, `1d`)
    pub fn binance_interval(&self) -> String {
        match self.0 {
            m if m < 60 => format!("{m}m"),
            m if m < 1440 => format!("{}h", m / 60),
            _ => "1d".to_string(),
        }
    }

    /// OKX candle bar (`5m`, `1H`, `1D`)
    pub fn okx_bar(&self) -> String {
        match self.0 {
            m if m < 60 => format!("{m}m"),
            m if m < 1440 => format!("{}H", m / 60),
            _ => "1D".to_string(),
        }
    }

    /// Bybit kline interval (`5`, `60`, `D`)
    pub fn bybit_interval(&self) -> String {
        match self.0 {
            m if m < 1440 => m.to_string(),
            _ => "D".to_string(),
        }
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

/// One OHLCV bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket open time
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base-asset volume traded in the bucket
    pub volume: f64,
}

impl Candle {
    /// Parse a venue kline row `[ts, open, high, low, close, volume, ...]`
    ///
    /// All three venues use this leading layout; timestamps may be numbers or
    /// strings of epoch milliseconds. A missing or null volume counts as zero.
    pub fn from_row(row: &[Value]) -> Result<Self, SourceError> {
        if row.len() < 5 {
            return Err(SourceError::Decode(format!(
                "kline row has {} fields",
                row.len()
            )));
        }

        let ts_ms = match &row[0] {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| SourceError::Decode(format!("bad kline timestamp: {}", row[0])))?;

        let open_time = Utc
            .timestamp_millis_opt(ts_ms)
            .single()
            .ok_or_else(|| SourceError::Decode(format!("timestamp out of range: {ts_ms}")))?;

        let volume = match row.get(5) {
            None | Some(Value::Null) => 0.0,
            Some(v) => value_f64(v)?,
        };
        if !volume.is_finite() || volume < 0.0 {
            return Err(SourceError::Decode(format!("invalid volume: {volume}")));
        }

        Ok(Candle {
            open_time,
            open: value_f64(&row[1])?,
            high: value_f64(&row[2])?,
            low: value_f64(&row[3])?,
            close: value_f64(&row[4])?,
            volume,
        })
    }

    /// Whether the bucket had closed by `now`
    pub fn is_closed(&self, width: BucketWidth, now: DateTime<Utc>) -> bool {
        self.open_time + width.duration() <= now
    }
}

fn value_f64(value: &Value) -> Result<f64, SourceError> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| SourceError::Decode(format!("not a number: {value}")))
}

/// A tradable spot market listed by a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMarket {
    /// Venue-native identifier (`BTCUSDT`, `BTC-USDT`)
    pub id: String,
    /// Unified `BASE/QUOTE` symbol
    pub symbol: String,
    pub base: String,
    pub quote: String,
}

impl CatalogMarket {
    pub fn new(id: impl Into<String>, base: impl Into<String>, quote: impl Into<String>) -> Self {
        let base = base.into().to_uppercase();
        let quote = quote.into().to_uppercase();
        Self {
            id: id.into(),
            symbol: format!("{base}/{quote}"),
            base,
            quote,
        }
    }
}

/// Full market listing of one source
///
/// Markets keep venue order; lookups work by unified symbol or native id.
#[derive(Debug, Clone)]
pub struct MarketCatalog {
    source: MarketSource,
    markets: Vec<CatalogMarket>,
    by_symbol: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl MarketCatalog {
    pub fn new(source: MarketSource, markets: Vec<CatalogMarket>) -> Self {
        let mut by_symbol = HashMap::with_capacity(markets.len());
        let mut by_id = HashMap::with_capacity(markets.len());
        for (idx, market) in markets.iter().enumerate() {
            by_symbol.entry(market.symbol.clone()).or_insert(idx);
            by_id.entry(market.id.clone()).or_insert(idx);
        }
        Self {
            source,
            markets,
            by_symbol,
            by_id,
        }
    }

    pub fn source(&self) -> MarketSource {
        self.source
    }

    /// Look up a market by unified symbol, then by native id
    pub fn get(&self, key: &str) -> Option<&CatalogMarket> {
        self.by_symbol
            .get(key)
            .or_else(|| self.by_id.get(key))
            .map(|&idx| &self.markets[idx])
    }

    pub fn markets(&self) -> &[CatalogMarket] {
        &self.markets
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

/// An asset paired with the market that represents it on one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMarket {
    pub ticker: String,
    pub source: MarketSource,
    pub market: CatalogMarket,
}

/// Market source errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Venue signalled rate limiting inside its response envelope
    #[error("{venue} rate limited: {message}")]
    RateLimited { venue: MarketSource, message: String },
    /// Venue returned an error envelope
    #[error("{venue} API error {code}: {message}")]
    Api {
        venue: MarketSource,
        code: String,
        message: String,
    },
    /// Response did not have the expected shape
    #[error("Malformed response: {0}")]
    Decode(String),
    /// A recent catalog load failed and is not retried yet
    #[error("Catalog unavailable: {0}")]
    CatalogDown(String),
}

impl SourceError {
    /// Whether a retry may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Http(e) => !e.is_decode() && !e.is_builder(),
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            SourceError::RateLimited { .. } => true,
            SourceError::Api { .. } | SourceError::Decode(_) | SourceError::CatalogDown(_) => false,
        }
    }
}
