//! Configuration loading tests

use std::io::Write;
use std::path::PathBuf;
use tokio_test::{assert_err, assert_ok};
use volspike::config::Config;
use volspike::market::MarketSource;

#[test]
fn test_example_config_loads() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.toml.example");
    let config = Config::load(&path).unwrap();

    assert_ok!(config.validate());
    assert_eq!(config.sources.enabled, MarketSource::ALL.to_vec());
    assert_eq!(config.lookback_buckets(), 288);
    assert!(config.telemetry.metrics_port.is_none());
}

#[test]
fn test_load_custom_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [detection]
        bucket_minutes = 15
        lookback_hours = 12
        pct_threshold = 150.0

        [scheduler]
        max_concurrency = 2

        [telemetry]
        log_format = "json"
        metrics_port = 9100
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_ok!(config.validate());
    assert_eq!(config.lookback_buckets(), 48);
    assert_eq!(config.thresholds().pct, 150.0);
    assert_eq!(config.thresholds().z, 3.0);
    assert_eq!(config.scheduler.max_concurrency, 2);
    assert_eq!(config.telemetry.metrics_port, Some(9100));
}

#[test]
fn test_invalid_toml_is_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[detection\nbucket_minutes = ").unwrap();
    assert_err!(Config::load(file.path()));
}

#[test]
fn test_zero_concurrency_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[scheduler]\nmax_concurrency = 0").unwrap();

    let config = assert_ok!(Config::load(file.path()));
    assert_err!(config.validate());
}

#[test]
fn test_lookback_beyond_every_source_cap_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[detection]\nbucket_minutes = 1\nlookback_hours = 24").unwrap();

    let config = assert_ok!(Config::load(file.path()));
    assert_eq!(config.candles_per_request(), 1442);
    let err = assert_err!(config.validate());
    assert!(err.to_string().contains("at most 1000"));
}

#[test]
fn test_lookback_beyond_okx_cap_only_is_accepted() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[detection]\nbucket_minutes = 5\nlookback_hours = 48").unwrap();

    let config = assert_ok!(Config::load(file.path()));
    assert!(config.candles_per_request() > MarketSource::Okx.max_candles());
    assert_ok!(config.validate());
}

#[test]
fn test_okx_alone_with_long_lookback_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[sources]\nenabled = [\"okx\"]\n\n[detection]\nbucket_minutes = 5\nlookback_hours = 48"
    )
    .unwrap();

    let config = assert_ok!(Config::load(file.path()));
    assert_err!(config.validate());
}
