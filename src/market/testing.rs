//! In-process market source for unit tests

use super::{
    BucketWidth, Candle, CatalogMarket, MarketCatalog, MarketDataSource, MarketSource, SourceError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source serving a fixed catalog and fixed candle series
pub struct StaticSource {
    kind: MarketSource,
    markets: Vec<CatalogMarket>,
    candles: HashMap<String, Vec<Candle>>,
    fail_catalog: bool,
    fail_candles: bool,
    catalog_calls: AtomicUsize,
    candle_calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(kind: MarketSource) -> Self {
        Self {
            kind,
            markets: Vec::new(),
            candles: HashMap::new(),
            fail_catalog: false,
            fail_candles: false,
            catalog_calls: AtomicUsize::new(0),
            candle_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_market(mut self, market: CatalogMarket) -> Self {
        self.markets.push(market);
        self
    }

    /// List `ticker`/USDT and serve `volumes` as completed buckets ending at `now`
    pub fn with_series(
        mut self,
        ticker: &str,
        volumes: &[f64],
        width: BucketWidth,
        now: DateTime<Utc>,
    ) -> Self {
        let market = CatalogMarket::new(format!("{ticker}USDT"), ticker, "USDT");
        self.candles
            .insert(market.id.clone(), candles_ending_at(volumes, width, now));
        self.markets.push(market);
        self
    }

    pub fn failing_catalog(mut self) -> Self {
        self.fail_catalog = true;
        self
    }

    pub fn failing_candles(mut self) -> Self {
        self.fail_candles = true;
        self
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub fn candle_calls(&self) -> usize {
        self.candle_calls.load(Ordering::SeqCst)
    }
}

/// Build closed candles, oldest first, whose last bucket closes at `now`
pub fn candles_ending_at(volumes: &[f64], width: BucketWidth, now: DateTime<Utc>) -> Vec<Candle> {
    let n = volumes.len() as i32;
    volumes
        .iter()
        .enumerate()
        .map(|(i, &volume)| Candle {
            open_time: now - width.duration() * (n - i as i32),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume,
        })
        .collect()
}

#[async_trait]
impl MarketDataSource for StaticSource {
    fn kind(&self) -> MarketSource {
        self.kind
    }

    async fn fetch_catalog(&self) -> Result<MarketCatalog, SourceError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_catalog {
            return Err(SourceError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(MarketCatalog::new(self.kind, self.markets.clone()))
    }

    async fn fetch_candles(
        &self,
        market: &CatalogMarket,
        _width: BucketWidth,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        self.candle_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_candles {
            return Err(SourceError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        let series = self.candles.get(&market.id).cloned().unwrap_or_default();
        let skip = series.len().saturating_sub(limit);
        Ok(series.into_iter().skip(skip).collect())
    }
}
