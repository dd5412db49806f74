//! In-process fakes for pipeline tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use volspike::config::Config;
use volspike::cooldown::CooldownGate;
use volspike::market::{
    BucketWidth, Candle, CatalogCache, CatalogMarket, MarketCatalog, MarketDataSource,
    MarketSource, SourceError,
};
use volspike::notify::Notifier;
use volspike::retry::RetryPolicy;
use volspike::scheduler::{AssetEvaluator, PollScheduler, SchedulerSettings};
use volspike::spike::SpikeDetector;
use volspike::store::StateStore;
use volspike::universe::{Asset, UniverseSource, UniverseTracker};
use volspike::volume::VolumeAggregator;

/// Venue serving canned candles, with the in-progress bucket appended
pub struct FakeSource {
    kind: MarketSource,
    candles: HashMap<String, Vec<Candle>>,
    failing: bool,
    pub candle_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(kind: MarketSource) -> Self {
        Self {
            kind,
            candles: HashMap::new(),
            failing: false,
            candle_calls: AtomicUsize::new(0),
        }
    }

    /// Closed buckets with `volumes`, the last closing at `now`, then one open bucket
    pub fn with_series(
        mut self,
        ticker: &str,
        volumes: &[f64],
        width: BucketWidth,
        now: DateTime<Utc>,
    ) -> Self {
        let n = volumes.len() as i32;
        let mut candles: Vec<Candle> = volumes
            .iter()
            .enumerate()
            .map(|(i, &volume)| candle(now - width.duration() * (n - i as i32), volume))
            .collect();
        candles.push(candle(now, 1.0e9));
        self.candles.insert(format!("{ticker}-USDT"), candles);
        self
    }

    /// Every history request fails like a gateway timeout
    pub fn timing_out(mut self) -> Self {
        self.failing = true;
        self
    }
}

fn candle(open_time: DateTime<Utc>, volume: f64) -> Candle {
    Candle {
        open_time,
        open: 1.0,
        high: 1.0,
        low: 1.0,
        close: 1.0,
        volume,
    }
}

#[async_trait]
impl MarketDataSource for FakeSource {
    fn kind(&self) -> MarketSource {
        self.kind
    }

    async fn fetch_catalog(&self) -> Result<MarketCatalog, SourceError> {
        let markets = self
            .candles
            .keys()
            .map(|id| {
                let base = id.trim_end_matches("-USDT");
                CatalogMarket::new(id.clone(), base, "USDT")
            })
            .collect();
        Ok(MarketCatalog::new(self.kind, markets))
    }

    async fn fetch_candles(
        &self,
        market: &CatalogMarket,
        _width: BucketWidth,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        self.candle_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            tokio::time::sleep(Duration::from_millis(5)).await;
            return Err(SourceError::Status {
                status: 504,
                body: "gateway timeout".to_string(),
            });
        }
        let series = self.candles.get(&market.id).cloned().unwrap_or_default();
        let skip = series.len().saturating_sub(limit);
        Ok(series.into_iter().skip(skip).collect())
    }
}

/// Fixed ranked universe
pub struct StaticUniverse(pub Vec<Asset>);

#[async_trait]
impl UniverseSource for StaticUniverse {
    async fn fetch_universe(&self) -> anyhow::Result<Vec<Asset>> {
        Ok(self.0.clone())
    }
}

/// Keeps every message it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn emit(&self, text: &str) -> anyhow::Result<()> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Test config: 5m buckets, 24-bucket baseline, default thresholds
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.detection.bucket_minutes = 5;
    config.detection.lookback_hours = 2;
    config.scheduler.asset_timeout_secs = 5;
    config
}

pub fn width() -> BucketWidth {
    BucketWidth::from_minutes(5).unwrap()
}

/// 24 quiet buckets of 100 followed by a current bucket of 1000
pub fn btc_spike_series() -> Vec<f64> {
    let mut volumes = vec![100.0; 24];
    volumes.push(1000.0);
    volumes
}

/// Assemble a scheduler the way the binary does, around fakes
pub fn build_scheduler(
    config: &Config,
    sources: Vec<Arc<dyn MarketDataSource>>,
    assets: Vec<Asset>,
    store: Arc<dyn StateStore>,
    notifier: Arc<RecordingNotifier>,
) -> PollScheduler {
    let aggregator = VolumeAggregator::new(
        sources,
        Arc::new(CatalogCache::new(config.catalog_ttl())),
        RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
        config.bucket_width().unwrap(),
        config.lookback_buckets(),
    )
    .with_source_timeout(config.source_timeout());
    let evaluator = AssetEvaluator::new(
        aggregator,
        SpikeDetector::new(config.thresholds()),
        CooldownGate::new(store, config.cooldown()),
        notifier.clone(),
    );
    let universe = UniverseTracker::new(
        Arc::new(StaticUniverse(assets)),
        config.universe_refresh_interval(),
    );
    PollScheduler::new(
        Arc::new(universe),
        Arc::new(evaluator),
        notifier,
        SchedulerSettings::from_config(config),
    )
}
