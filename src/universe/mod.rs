//! Asset universe module
//!
//! The ranked list of assets the scheduler evaluates each tick, refreshed from
//! CoinGecko on a slower cadence.

mod coingecko;
mod tracker;

pub use coingecko::{CoinGeckoClient, CoinGeckoConfig};
pub use tracker::{dedupe_assets, RefreshOutcome, UniverseTracker};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One tracked asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Canonical uppercase ticker, e.g. "BTC"
    pub ticker: String,
    /// Display name, e.g. "Bitcoin"
    pub name: String,
}

impl Asset {
    pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
        }
    }
}

/// Trait for ranked universe providers
#[async_trait]
pub trait UniverseSource: Send + Sync {
    /// Fetch the current ranked asset list, best first
    async fn fetch_universe(&self) -> anyhow::Result<Vec<Asset>>;
}
