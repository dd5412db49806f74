//! Cross-source volume aggregation

use super::series::{combine_series, completed_volumes, is_current, latest_close};
use crate::market::{BucketWidth, CatalogCache, MarketDataSource, MarketSource, SourceSession};
use crate::retry::RetryPolicy;
use crate::telemetry;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// What one source contributed to an asset's aggregation
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    /// Usable series of exactly `lookback + 1` completed buckets, oldest first
    Series {
        source: MarketSource,
        volumes: Vec<f64>,
    },
    /// Asset not listed against an accepted quote
    Unlisted { source: MarketSource },
    /// Fewer completed buckets than required
    Insufficient {
        source: MarketSource,
        buckets: usize,
    },
    /// Newest completed bucket is older than the latest bucket boundary
    Stale {
        source: MarketSource,
        last_close: DateTime<Utc>,
    },
    /// Source errored after retries, or ran past its time limit
    Unavailable {
        source: MarketSource,
        reason: String,
    },
}

impl SourceOutcome {
    pub fn source(&self) -> MarketSource {
        match self {
            SourceOutcome::Series { source, .. }
            | SourceOutcome::Unlisted { source }
            | SourceOutcome::Insufficient { source, .. }
            | SourceOutcome::Stale { source, .. }
            | SourceOutcome::Unavailable { source, .. } => *source,
        }
    }

    /// The series, if this source contributes
    pub fn series(&self) -> Option<&[f64]> {
        match self {
            SourceOutcome::Series { volumes, .. } => Some(volumes),
            _ => None,
        }
    }
}

/// Summed volume across contributing sources
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateVolume {
    /// Most recent completed bucket
    pub current: f64,
    /// Older buckets in the lookback window, oldest first
    pub baseline: Vec<f64>,
    /// Sources that contributed, in configuration order
    pub sources: Vec<MarketSource>,
}

impl AggregateVolume {
    /// Split a combined series into current bucket and baseline
    pub fn from_series(mut combined: Vec<f64>, sources: Vec<MarketSource>) -> Option<Self> {
        let current = combined.pop()?;
        Some(Self {
            current,
            baseline: combined,
            sources,
        })
    }
}

/// Queries every configured source for one asset and sums their series
pub struct VolumeAggregator {
    sources: Vec<Arc<dyn MarketDataSource>>,
    catalogs: Arc<CatalogCache>,
    retry: RetryPolicy,
    width: BucketWidth,
    lookback: usize,
    source_timeout: Option<Duration>,
}

impl VolumeAggregator {
    pub fn new(
        sources: Vec<Arc<dyn MarketDataSource>>,
        catalogs: Arc<CatalogCache>,
        retry: RetryPolicy,
        width: BucketWidth,
        lookback: usize,
    ) -> Self {
        Self {
            sources,
            catalogs,
            retry,
            width,
            lookback,
            source_timeout: None,
        }
    }

    /// Give up on a single source after `limit`, leaving the others to contribute
    pub fn with_source_timeout(mut self, limit: Duration) -> Self {
        self.source_timeout = Some(limit);
        self
    }

    pub fn width(&self) -> BucketWidth {
        self.width
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Buckets each source must supply: the baseline plus the current one
    pub fn required_buckets(&self) -> usize {
        self.lookback + 1
    }

    /// Aggregate `ticker` across all sources as of `now`
    ///
    /// Returns `None` when no source contributed.
    pub async fn aggregate(&self, ticker: &str, now: DateTime<Utc>) -> Option<AggregateVolume> {
        let outcomes = self.collect(ticker, now).await;
        Self::combine(&outcomes)
    }

    /// Query every source concurrently; one outcome per source in config order
    pub async fn collect(&self, ticker: &str, now: DateTime<Utc>) -> Vec<SourceOutcome> {
        let queries = self
            .sources
            .iter()
            .map(|source| self.query_source(source.as_ref(), ticker, now));
        let outcomes = join_all(queries).await;

        for outcome in &outcomes {
            match outcome {
                SourceOutcome::Unavailable { source, reason } => {
                    tracing::warn!(
                        ticker,
                        source = %source,
                        reason = %reason,
                        "Source unavailable"
                    );
                    telemetry::record_source_failure(*source);
                }
                SourceOutcome::Stale { source, last_close } => {
                    tracing::debug!(
                        ticker,
                        source = %source,
                        %last_close,
                        "Series behind latest bucket"
                    );
                }
                SourceOutcome::Insufficient { source, buckets } => {
                    tracing::debug!(ticker, source = %source, buckets, "Not enough history");
                }
                SourceOutcome::Unlisted { source } => {
                    tracing::trace!(ticker, source = %source, "Not listed");
                }
                SourceOutcome::Series { .. } => {}
            }
        }
        outcomes
    }

    /// Combine the contributing outcomes
    pub fn combine(outcomes: &[SourceOutcome]) -> Option<AggregateVolume> {
        let mut sources = Vec::new();
        let mut series = Vec::new();
        for outcome in outcomes {
            if let Some(volumes) = outcome.series() {
                sources.push(outcome.source());
                series.push(volumes.to_vec());
            }
        }

        let combined = combine_series(&series)?;
        AggregateVolume::from_series(combined, sources)
    }

    async fn query_source(
        &self,
        source: &dyn MarketDataSource,
        ticker: &str,
        now: DateTime<Utc>,
    ) -> SourceOutcome {
        let query = self.query_source_inner(source, ticker, now);
        let Some(limit) = self.source_timeout else {
            return query.await;
        };
        tokio::time::timeout(limit, query)
            .await
            .unwrap_or_else(|_| SourceOutcome::Unavailable {
                source: source.kind(),
                reason: format!("timed out after {limit:?}"),
            })
    }

    async fn query_source_inner(
        &self,
        source: &dyn MarketDataSource,
        ticker: &str,
        now: DateTime<Utc>,
    ) -> SourceOutcome {
        let kind = source.kind();

        let session = match SourceSession::open(source, &self.catalogs, &self.retry).await {
            Ok(session) => session,
            Err(e) => {
                return SourceOutcome::Unavailable {
                    source: kind,
                    reason: e.to_string(),
                }
            }
        };

        let Some(resolved) = session.resolve(ticker) else {
            return SourceOutcome::Unlisted { source: kind };
        };

        let required = self.required_buckets();
        // one extra for the bucket still in progress
        let candles = match session.fetch_candles(&resolved, self.width, required + 1).await {
            Ok(candles) => candles,
            Err(e) => {
                return SourceOutcome::Unavailable {
                    source: kind,
                    reason: e.to_string(),
                }
            }
        };

        let volumes = completed_volumes(&candles, self.width, now);
        if let Some(last_close) = latest_close(&candles, self.width, now) {
            if !is_current(last_close, self.width, now) {
                return SourceOutcome::Stale {
                    source: kind,
                    last_close,
                };
            }
        }
        if volumes.len() < required {
            return SourceOutcome::Insufficient {
                source: kind,
                buckets: volumes.len(),
            };
        }

        SourceOutcome::Series {
            source: kind,
            volumes: volumes[volumes.len() - required..].to_vec(),
        }
    }
}
