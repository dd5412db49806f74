//! End-to-end pipeline tests

use crate::support::{
    btc_spike_series, build_scheduler, test_config, width, FakeSource, RecordingNotifier,
};
use chrono::{Duration, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_test::assert_ok;
use volspike::market::{MarketDataSource, MarketSource};
use volspike::store::{SqliteStore, StateStore};
use volspike::universe::Asset;

fn bitcoin() -> Vec<Asset> {
    vec![Asset::new("BTC", "Bitcoin")]
}

#[tokio::test]
async fn test_btc_spike_alerts_once_per_cooldown() {
    let config = test_config();
    assert_eq!(config.lookback_buckets(), 24);

    let now = Utc::now();
    let sources: Vec<Arc<dyn MarketDataSource>> = vec![
        Arc::new(
            FakeSource::new(MarketSource::Binance)
                .with_series("BTC", &btc_spike_series(), width(), now),
        ),
        Arc::new(
            FakeSource::new(MarketSource::Okx)
                .with_series("BTC", &btc_spike_series(), width(), now),
        ),
    ];
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = build_scheduler(&config, sources, bitcoin(), store.clone(), notifier.clone());

    let first = assert_ok!(scheduler.tick().await);
    assert_eq!(first.alerted, 1);

    let spikes = store.recent_spikes(10).unwrap();
    assert_eq!(spikes.len(), 1);
    let spike = &spikes[0];
    assert_eq!(spike.ticker, "BTC");
    assert!((spike.percent_delta - 900.0).abs() < 1e-9);
    assert_eq!(spike.current_volume, 2000.0);
    assert_eq!(spike.baseline_mean, 200.0);
    assert_eq!(spike.sources, vec![MarketSource::Binance, MarketSource::Okx]);
    assert!(store.last_alert("BTC").unwrap().is_some());

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Bitcoin (BTC)"));
    assert!(messages[0].contains("+900%"));

    let second = scheduler.tick().await.unwrap();
    assert_eq!(second.alerted, 0);
    assert_eq!(second.suppressed, 1);
    assert_eq!(notifier.messages().len(), 1);
    assert_eq!(store.recent_spikes(10).unwrap().len(), 1);
}

#[tokio::test]
async fn test_failing_source_does_not_block_alert() {
    let config = test_config();
    let now = Utc::now();
    let down = Arc::new(
        FakeSource::new(MarketSource::Okx)
            .with_series("BTC", &btc_spike_series(), width(), now)
            .timing_out(),
    );
    let sources: Vec<Arc<dyn MarketDataSource>> = vec![
        Arc::new(
            FakeSource::new(MarketSource::Binance)
                .with_series("BTC", &btc_spike_series(), width(), now),
        ),
        down.clone(),
    ];
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = build_scheduler(&config, sources, bitcoin(), store.clone(), notifier.clone());

    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.alerted, 1);
    assert_eq!(summary.timed_out, 0);
    // retried once before giving up
    assert_eq!(down.candle_calls.load(Ordering::SeqCst), 2);

    let spike = &store.recent_spikes(1).unwrap()[0];
    assert_eq!(spike.sources, vec![MarketSource::Binance]);
    assert_eq!(spike.current_volume, 1000.0);
}

#[tokio::test]
async fn test_quiet_market_is_silent() {
    let config = test_config();
    let now = Utc::now();
    let sources: Vec<Arc<dyn MarketDataSource>> = vec![Arc::new(
        FakeSource::new(MarketSource::Bybit).with_series("BTC", &[100.0; 25], width(), now),
    )];
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = build_scheduler(&config, sources, bitcoin(), store.clone(), notifier.clone());

    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.quiet, 1);
    assert!(notifier.messages().is_empty());
    assert!(store.last_alert("BTC").unwrap().is_none());
}

#[tokio::test]
async fn test_unlisted_asset_is_skipped() {
    let config = test_config();
    let now = Utc::now();
    let sources: Vec<Arc<dyn MarketDataSource>> = vec![Arc::new(
        FakeSource::new(MarketSource::Binance)
            .with_series("BTC", &btc_spike_series(), width(), now),
    )];
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let assets = vec![Asset::new("BTC", "Bitcoin"), Asset::new("NOPE", "Unlisted")];
    let scheduler = build_scheduler(&config, sources, assets, store, notifier);

    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.assets, 2);
    assert_eq!(summary.alerted, 1);
    assert_eq!(summary.no_data, 1);
}

#[tokio::test]
async fn test_expired_cooldown_alerts_again() {
    let config = test_config();
    let now = Utc::now();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    store.upsert_alert("BTC", now - Duration::minutes(31)).unwrap();

    let sources: Vec<Arc<dyn MarketDataSource>> = vec![Arc::new(
        FakeSource::new(MarketSource::Binance)
            .with_series("BTC", &btc_spike_series(), width(), now),
    )];
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = build_scheduler(&config, sources, bitcoin(), store.clone(), notifier.clone());

    assert_eq!(scheduler.tick().await.unwrap().alerted, 1);
    assert!(store.last_alert("BTC").unwrap().unwrap() > now - Duration::minutes(1));
}

#[tokio::test]
async fn test_cooldown_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.sqlite");
    let config = test_config();
    let now = Utc::now();
    let sources = || -> Vec<Arc<dyn MarketDataSource>> {
        vec![Arc::new(
            FakeSource::new(MarketSource::Binance)
                .with_series("BTC", &btc_spike_series(), width(), now),
        )]
    };

    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = build_scheduler(&config, sources(), bitcoin(), store, notifier);
        assert_eq!(scheduler.tick().await.unwrap().alerted, 1);
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = build_scheduler(&config, sources(), bitcoin(), store, notifier.clone());
    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.alerted, 0);
    assert_eq!(summary.suppressed, 1);
    assert!(notifier.messages().is_empty());
}
