//! Scoped source sessions
//!
//! A session covers one catalog-plus-history query against one source. It is
//! opened with the source's catalog, used for resolution and the history fetch,
//! and released when dropped, whichever way the query exits.

use super::resolver::resolve_in_catalog;
use super::{
    BucketWidth, CatalogCache, Candle, MarketCatalog, MarketDataSource, MarketSource,
    ResolvedMarket, SourceError,
};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use std::time::Instant;

/// One query's view of a source
pub struct SourceSession<'a> {
    source: &'a dyn MarketDataSource,
    retry: &'a RetryPolicy,
    catalog: Arc<MarketCatalog>,
    opened_at: Instant,
}

impl<'a> SourceSession<'a> {
    /// Open a session, loading (or reusing) the source's catalog
    pub async fn open(
        source: &'a dyn MarketDataSource,
        cache: &CatalogCache,
        retry: &'a RetryPolicy,
    ) -> Result<SourceSession<'a>, SourceError> {
        let catalog = cache.get_or_load(source, retry).await?;
        Ok(Self {
            source,
            retry,
            catalog,
            opened_at: Instant::now(),
        })
    }

    pub fn kind(&self) -> MarketSource {
        self.source.kind()
    }

    pub fn catalog(&self) -> &MarketCatalog {
        &self.catalog
    }

    /// Resolve `ticker` against the session's catalog
    pub fn resolve(&self, ticker: &str) -> Option<ResolvedMarket> {
        resolve_in_catalog(&self.catalog, ticker).map(|market| ResolvedMarket {
            ticker: ticker.to_uppercase(),
            source: self.kind(),
            market: market.clone(),
        })
    }

    /// Fetch up to `limit` most recent buckets, oldest first, with retries
    pub async fn fetch_candles(
        &self,
        resolved: &ResolvedMarket,
        width: BucketWidth,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        self.retry
            .run(
                |_| self.source.fetch_candles(&resolved.market, width, limit),
                SourceError::is_retryable,
            )
            .await
    }
}

impl Drop for SourceSession<'_> {
    fn drop(&mut self) {
        tracing::trace!(
            source = %self.source.kind(),
            held_ms = self.opened_at.elapsed().as_millis() as u64,
            "Source session released"
        );
    }
}
