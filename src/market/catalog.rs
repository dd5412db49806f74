//! Short-lived catalog cache
//!
//! Catalog listings are large and change rarely, so each source's catalog is
//! kept for a bounded TTL. The TTL is clamped by configuration to the universe
//! refresh interval. Concurrent misses on the same source wait for a single load,
//! and a failed load is remembered briefly so queued callers fail fast instead
//! of repeating it.

use super::{MarketCatalog, MarketDataSource, MarketSource, SourceError};
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Longest a failed load is served from the cache
pub const FAILED_LOAD_HOLD: Duration = Duration::from_secs(30);

enum Slot {
    Empty,
    Loaded {
        at: Instant,
        catalog: Arc<MarketCatalog>,
    },
    Failed {
        at: Instant,
        reason: String,
    },
}

/// Per-source catalog cache
pub struct CatalogCache {
    ttl: Duration,
    failure_hold: Duration,
    slots: HashMap<MarketSource, Mutex<Slot>>,
}

impl CatalogCache {
    /// Create a cache holding catalogs for `ttl` (zero disables caching)
    pub fn new(ttl: Duration) -> Self {
        let slots = MarketSource::ALL
            .into_iter()
            .map(|s| (s, Mutex::new(Slot::Empty)))
            .collect();
        Self {
            ttl,
            failure_hold: ttl.min(FAILED_LOAD_HOLD),
            slots,
        }
    }

    /// A cache that reloads on every call
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached catalog for `source`, loading it if missing or stale
    pub async fn get_or_load(
        &self,
        source: &dyn MarketDataSource,
        retry: &RetryPolicy,
    ) -> Result<Arc<MarketCatalog>, SourceError> {
        let kind = source.kind();
        let Some(slot) = self.slots.get(&kind).filter(|_| !self.ttl.is_zero()) else {
            return Self::load(source, retry).await.map(Arc::new);
        };

        let mut guard = slot.lock().await;
        match &*guard {
            Slot::Loaded { at, catalog } if at.elapsed() < self.ttl => {
                return Ok(catalog.clone());
            }
            Slot::Failed { at, reason } if at.elapsed() < self.failure_hold => {
                return Err(SourceError::CatalogDown(reason.clone()));
            }
            _ => {}
        }

        match Self::load(source, retry).await {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                tracing::debug!(source = %kind, markets = catalog.len(), "Catalog loaded");
                *guard = Slot::Loaded {
                    at: Instant::now(),
                    catalog: catalog.clone(),
                };
                Ok(catalog)
            }
            Err(e) => {
                tracing::debug!(source = %kind, error = %e, "Catalog load failed");
                *guard = Slot::Failed {
                    at: Instant::now(),
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Drop the cached catalog for `source`
    pub async fn invalidate(&self, source: MarketSource) {
        if let Some(slot) = self.slots.get(&source) {
            *slot.lock().await = Slot::Empty;
        }
    }

    async fn load(
        source: &dyn MarketDataSource,
        retry: &RetryPolicy,
    ) -> Result<MarketCatalog, SourceError> {
        retry
            .run(|_| source.fetch_catalog(), SourceError::is_retryable)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::testing::StaticSource;
    use crate::market::CatalogMarket;

    fn source() -> StaticSource {
        StaticSource::new(MarketSource::Binance)
            .with_market(CatalogMarket::new("BTCUSDT", "BTC", "USDT"))
    }

    #[tokio::test]
    async fn test_cache_reuses_catalog_within_ttl() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        let src = source();
        let retry = RetryPolicy::no_retry();

        let first = cache.get_or_load(&src, &retry).await.unwrap();
        let second = cache.get_or_load(&src, &retry).await.unwrap();

        assert_eq!(src.catalog_calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_disabled_cache_reloads() {
        let cache = CatalogCache::disabled();
        let src = source();
        let retry = RetryPolicy::no_retry();

        cache.get_or_load(&src, &retry).await.unwrap();
        cache.get_or_load(&src, &retry).await.unwrap();

        assert_eq!(src.catalog_calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        let src = source();
        let retry = RetryPolicy::no_retry();

        cache.get_or_load(&src, &retry).await.unwrap();
        cache.invalidate(MarketSource::Binance).await;
        cache.get_or_load(&src, &retry).await.unwrap();

        assert_eq!(src.catalog_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_load_is_held_briefly() {
        let cache = CatalogCache::new(Duration::from_secs(900));
        let src = StaticSource::new(MarketSource::Okx).failing_catalog();
        let retry = RetryPolicy::no_retry();

        assert!(cache.get_or_load(&src, &retry).await.is_err());
        let held = cache.get_or_load(&src, &retry).await;
        assert!(matches!(held, Err(SourceError::CatalogDown(_))));
        assert_eq!(src.catalog_calls(), 1);

        tokio::time::advance(FAILED_LOAD_HOLD + Duration::from_secs(1)).await;
        assert!(cache.get_or_load(&src, &retry).await.is_err());
        assert_eq!(src.catalog_calls(), 2);
    }

    #[tokio::test]
    async fn test_disabled_cache_does_not_hold_failures() {
        let cache = CatalogCache::disabled();
        let src = StaticSource::new(MarketSource::Okx).failing_catalog();
        let retry = RetryPolicy::no_retry();

        assert!(cache.get_or_load(&src, &retry).await.is_err());
        assert!(cache.get_or_load(&src, &retry).await.is_err());
        assert_eq!(src.catalog_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_share_failed_load() {
        let cache = Arc::new(CatalogCache::new(Duration::from_secs(900)));
        let src = Arc::new(StaticSource::new(MarketSource::Okx).failing_catalog());
        let retry = RetryPolicy::no_retry();

        let loads = (0..4).map(|_| cache.get_or_load(src.as_ref(), &retry));
        let results = futures_util::future::join_all(loads).await;

        assert!(results.iter().all(Result::is_err));
        assert_eq!(src.catalog_calls(), 1);
    }
}
