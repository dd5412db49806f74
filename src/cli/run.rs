//! Run command implementation

use crate::config::Config;
use crate::cooldown::CooldownGate;
use crate::market::{build_sources, CatalogCache};
use crate::notify;
use crate::scheduler::{AssetEvaluator, PollScheduler, SchedulerSettings};
use crate::spike::SpikeDetector;
use crate::store::{SqliteStore, StateStore};
use crate::universe::{CoinGeckoClient, CoinGeckoConfig, UniverseTracker};
use crate::volume::VolumeAggregator;
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run a single tick and exit
    #[arg(long)]
    pub once: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        config.validate()?;
        let scheduler = build_scheduler(config)?;

        if self.once {
            let summary = scheduler.tick().await?;
            println!(
                "assets={} alerted={} suppressed={} quiet={} no_data={} timed_out={} failed={} \
                 panicked={}",
                summary.assets,
                summary.alerted,
                summary.suppressed,
                summary.quiet,
                summary.no_data,
                summary.timed_out,
                summary.failed,
                summary.panicked
            );
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                shutdown.cancel();
            }
        });

        scheduler.run(cancel).await?;
        Ok(())
    }
}

/// Wire sources, store, notifier and universe into a scheduler
fn build_scheduler(config: &Config) -> anyhow::Result<PollScheduler> {
    let timeout = config.request_timeout();
    let retry = config.retry_policy();

    let store: Arc<dyn StateStore> = Arc::new(SqliteStore::open(&config.store.path)?);
    let notifier = notify::from_config(&config.notify, timeout)?;

    let sources = build_sources(&config.sources.enabled, timeout)?;
    let aggregator = VolumeAggregator::new(
        sources,
        Arc::new(CatalogCache::new(config.catalog_ttl())),
        retry.clone(),
        config.bucket_width()?,
        config.lookback_buckets(),
    )
    .with_source_timeout(config.source_timeout());
    let evaluator = AssetEvaluator::new(
        aggregator,
        SpikeDetector::new(config.thresholds()),
        CooldownGate::new(store, config.cooldown()),
        notifier.clone(),
    );

    let coingecko = CoinGeckoClient::new(
        CoinGeckoConfig::from_config(&config.universe, timeout),
        retry,
    )?;
    let universe = UniverseTracker::new(Arc::new(coingecko), config.universe_refresh_interval());

    tracing::info!(
        sources = ?config.sources.enabled,
        bucket = %config.bucket_width()?,
        lookback = config.lookback_buckets(),
        store = %config.store.path.display(),
        "Pipeline ready"
    );

    Ok(PollScheduler::new(
        Arc::new(universe),
        Arc::new(evaluator),
        notifier,
        SchedulerSettings::from_config(config),
    ))
}
