//! Market data module
//!
//! Spot market catalogs and bucketed volume history from Binance, OKX and Bybit,
//! plus resolution of canonical tickers to each venue's market.

mod binance;
mod bybit;
mod catalog;
pub(crate) mod http;
mod okx;
mod resolver;
mod session;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use binance::BinanceSource;
pub use bybit::BybitSource;
pub use catalog::CatalogCache;
pub use okx::OkxSource;
pub use resolver::{candidate_keys, resolve_in_catalog, resolve_market, QUOTE_CURRENCIES};
pub use session::SourceSession;
pub use types::{
    BucketWidth, Candle, CatalogMarket, MarketCatalog, MarketSource, ResolvedMarket, SourceError,
};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for market data source implementations
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Which source this is
    fn kind(&self) -> MarketSource;
    /// Load the full spot market listing
    async fn fetch_catalog(&self) -> Result<MarketCatalog, SourceError>;
    /// Fetch up to `limit` most recent buckets for `market`, oldest first
    async fn fetch_candles(
        &self,
        market: &CatalogMarket,
        width: BucketWidth,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError>;
}

/// Construct REST clients for the given sources
pub fn build_sources(
    enabled: &[MarketSource],
    request_timeout: Duration,
) -> Result<Vec<Arc<dyn MarketDataSource>>, SourceError> {
    let mut sources: Vec<Arc<dyn MarketDataSource>> = Vec::with_capacity(enabled.len());
    for kind in enabled {
        let source: Arc<dyn MarketDataSource> = match kind {
            MarketSource::Binance => Arc::new(BinanceSource::new(request_timeout)?),
            MarketSource::Okx => Arc::new(OkxSource::new(request_timeout)?),
            MarketSource::Bybit => Arc::new(BybitSource::new(request_timeout)?),
        };
        sources.push(source);
    }
    Ok(sources)
}
