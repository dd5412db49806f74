//! Ticker to market resolution
//!
//! Venues name the same spot pair differently (`BTC/USDT`, `BTCUSDT`,
//! `BTC-USDT`). Resolution tries the common stablecoin quotes by exact key
//! first and then scans the catalog for any market with a matching base.
//!
//! The base scan can pick an unrelated market when a venue reuses a ticker for
//! a different asset. That ambiguity is accepted; no disambiguation is attempted.

use super::session::SourceSession;
use super::{CatalogCache, CatalogMarket, MarketCatalog, MarketDataSource, ResolvedMarket};
use crate::retry::RetryPolicy;

/// Accepted quote currencies, in preference order
pub const QUOTE_CURRENCIES: [&str; 2] = ["USDT", "USDC"];

/// Exact-match keys tried before the fallback scan
pub fn candidate_keys(ticker: &str) -> [String; 3] {
    [
        format!("{ticker}/{}", QUOTE_CURRENCIES[0]),
        format!("{ticker}/{}", QUOTE_CURRENCIES[1]),
        format!("{ticker}{}", QUOTE_CURRENCIES[0]),
    ]
}

/// Find the market for `ticker` in one catalog
pub fn resolve_in_catalog<'a>(
    catalog: &'a MarketCatalog,
    ticker: &str,
) -> Option<&'a CatalogMarket> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return None;
    }

    for key in candidate_keys(&ticker) {
        if let Some(market) = catalog.get(&key) {
            return Some(market);
        }
    }

    catalog.markets().iter().find(|m| {
        m.base == ticker && QUOTE_CURRENCIES.iter().any(|q| m.symbol.contains(q))
    })
}

/// Resolve `ticker` on `source`, loading its catalog through the cache
///
/// An unreachable source resolves to `None` like an unlisted asset.
pub async fn resolve_market(
    source: &dyn MarketDataSource,
    cache: &CatalogCache,
    retry: &RetryPolicy,
    ticker: &str,
) -> Option<ResolvedMarket> {
    match SourceSession::open(source, cache, retry).await {
        Ok(session) => session.resolve(ticker),
        Err(e) => {
            tracing::debug!(source = %source.kind(), ticker, error = %e, "Catalog unavailable");
            None
        }
    }
}
