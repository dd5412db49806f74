//! Universe tracker implementation

use super::{Asset, UniverseSource};
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// Result of a refresh attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Universe is younger than the refresh interval
    Current,
    /// Universe replaced
    Refreshed { assets: usize },
    /// Fetch failed; the previous universe is kept
    Failed {
        error: String,
        /// First failure since the last success
        first_in_streak: bool,
    },
}

#[derive(Default)]
struct RefreshState {
    last_success: Option<Instant>,
    failing: bool,
}

/// Holds the current universe and replaces it wholesale on refresh
pub struct UniverseTracker {
    source: Arc<dyn UniverseSource>,
    refresh_interval: Duration,
    assets: RwLock<Arc<Vec<Asset>>>,
    state: Mutex<RefreshState>,
}

impl UniverseTracker {
    /// Create an empty tracker; the first refresh always fetches
    pub fn new(source: Arc<dyn UniverseSource>, refresh_interval: Duration) -> Self {
        Self {
            source,
            refresh_interval,
            assets: RwLock::new(Arc::new(Vec::new())),
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Snapshot of the current universe
    pub async fn assets(&self) -> Arc<Vec<Asset>> {
        self.assets.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether the refresh interval has passed since the last success
    pub async fn is_stale(&self) -> bool {
        let state = self.state.lock().await;
        Self::stale(&state, self.refresh_interval)
    }

    fn stale(state: &RefreshState, interval: Duration) -> bool {
        match state.last_success {
            None => true,
            Some(at) => at.elapsed() > interval,
        }
    }

    /// Refresh only if the universe is stale
    pub async fn refresh_if_stale(&self) -> RefreshOutcome {
        let mut state = self.state.lock().await;
        if !Self::stale(&state, self.refresh_interval) {
            return RefreshOutcome::Current;
        }
        self.refresh_locked(&mut state).await
    }

    /// Refresh unconditionally
    pub async fn refresh(&self) -> RefreshOutcome {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state).await
    }

    async fn refresh_locked(&self, state: &mut RefreshState) -> RefreshOutcome {
        let result = self.source.fetch_universe().await.and_then(|assets| {
            if assets.is_empty() {
                anyhow::bail!("universe source returned no assets");
            }
            Ok(assets)
        });

        match result {
            Ok(fetched) => {
                let fetched_len = fetched.len();
                let assets = dedupe_assets(fetched);
                if assets.len() < fetched_len {
                    tracing::debug!(
                        dropped = fetched_len - assets.len(),
                        "Dropped duplicate tickers from universe"
                    );
                }

                let count = assets.len();
                *self.assets.write().await = Arc::new(assets);
                state.last_success = Some(Instant::now());
                state.failing = false;

                telemetry::set_gauge(GaugeMetric::UniverseSize, count as f64);
                tracing::info!(assets = count, "Universe refreshed");
                RefreshOutcome::Refreshed { assets: count }
            }
            Err(e) => {
                let first_in_streak = !state.failing;
                state.failing = true;

                telemetry::increment(CounterMetric::UniverseRefreshFailures);
                let kept = self.len().await;
                tracing::warn!(error = %e, kept, "Universe refresh failed");
                RefreshOutcome::Failed {
                    error: format!("{e:#}"),
                    first_in_streak,
                }
            }
        }
    }
}

/// Keep the first (highest ranked) asset for each ticker
pub fn dedupe_assets(assets: Vec<Asset>) -> Vec<Asset> {
    let mut seen = HashSet::new();
    assets
        .into_iter()
        .filter(|asset| seen.insert(asset.ticker.clone()))
        .collect()
}
