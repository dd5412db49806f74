//! Configuration types for volspike

use crate::market::{BucketWidth, MarketSource};
use crate::retry::RetryPolicy;
use crate::spike::{SpikeThresholds, MIN_BASELINE_BUCKETS};
use crate::telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// CoinGecko public API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Root configuration structure
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub detection: DetectionConfig,
    pub alerts: AlertsConfig,
    pub scheduler: SchedulerConfig,
    pub universe: UniverseConfig,
    pub notify: NotifyConfig,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
}

/// Market data sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_sources")]
    pub enabled: Vec<MarketSource>,

    /// Per-request HTTP timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long a venue's market listing is reused (seconds, 0 disables)
    #[serde(default = "default_catalog_ttl")]
    pub catalog_ttl_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_sources() -> Vec<MarketSource> {
    MarketSource::ALL.to_vec()
}
fn default_request_timeout() -> u64 {
    15
}
fn default_catalog_ttl() -> u64 {
    900
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: default_sources(),
            request_timeout_secs: default_request_timeout(),
            catalog_ttl_secs: default_catalog_ttl(),
            retry: RetryConfig::default(),
        }
    }
}

/// Backoff applied to every source call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_pct")]
    pub jitter_pct: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_jitter_pct() -> f64 {
    0.2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_pct: default_jitter_pct(),
        }
    }
}

/// Spike detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Bucket width in minutes
    #[serde(default = "default_bucket_minutes")]
    pub bucket_minutes: u32,

    /// Baseline window length in hours
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,

    /// Percent above the baseline mean that triggers
    #[serde(default = "default_pct_threshold")]
    pub pct_threshold: f64,

    /// Z-score that triggers
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,
}

fn default_bucket_minutes() -> u32 {
    5
}
fn default_lookback_hours() -> u32 {
    24
}
fn default_pct_threshold() -> f64 {
    200.0
}
fn default_z_threshold() -> f64 {
    3.0
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: default_bucket_minutes(),
            lookback_hours: default_lookback_hours(),
            pct_threshold: default_pct_threshold(),
            z_threshold: default_z_threshold(),
        }
    }
}

/// Alert gating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
}

fn default_cooldown_minutes() -> u64 {
    30
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown_minutes(),
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Asset evaluations allowed in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Upper bound on one asset's evaluation, retries included
    #[serde(default = "default_asset_timeout")]
    pub asset_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    60
}
fn default_max_concurrency() -> usize {
    6
}
fn default_asset_timeout() -> u64 {
    120
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_concurrency: default_max_concurrency(),
            asset_timeout_secs: default_asset_timeout(),
        }
    }
}

/// Ranked asset universe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    #[serde(default = "default_universe_url")]
    pub base_url: String,

    /// Number of top assets by market cap
    #[serde(default = "default_universe_size")]
    pub size: usize,

    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    #[serde(default = "default_universe_refresh")]
    pub refresh_interval_secs: u64,
}

fn default_universe_url() -> String {
    COINGECKO_API_URL.to_string()
}
fn default_universe_size() -> usize {
    50
}
fn default_vs_currency() -> String {
    "usd".to_string()
}
fn default_universe_refresh() -> u64 {
    6 * 60 * 60
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            base_url: default_universe_url(),
            size: default_universe_size(),
            vs_currency: default_vs_currency(),
            refresh_interval_secs: default_universe_refresh(),
        }
    }
}

/// Alert transport; both fields set selects Telegram
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

/// Persistent state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/state.sqlite")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Serve Prometheus metrics on this port when set
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; empty values are ignored
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.notify.telegram_token = Some(token);
        }
        if let Some(chat_id) = get("TELEGRAM_CHAT_ID") {
            self.notify.telegram_chat_id = Some(chat_id);
        }
        if let Some(path) = get("VOLSPIKE_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sources.enabled.is_empty() {
            anyhow::bail!("sources.enabled must name at least one source");
        }
        self.bucket_width()?;
        let buckets = self.lookback_buckets();
        if buckets < MIN_BASELINE_BUCKETS {
            anyhow::bail!(
                "lookback of {}h at {}m buckets gives {} buckets, need at least {}",
                self.detection.lookback_hours,
                self.detection.bucket_minutes,
                buckets,
                MIN_BASELINE_BUCKETS
            );
        }
        let needed = self.candles_per_request();
        let capacity = self
            .sources
            .enabled
            .iter()
            .map(MarketSource::max_candles)
            .max()
            .unwrap_or(0);
        if needed > capacity {
            anyhow::bail!(
                "lookback of {} buckets needs {} candles per request, \
                 but enabled sources serve at most {}",
                buckets,
                needed,
                capacity
            );
        }
        for source in &self.sources.enabled {
            if needed > source.max_candles() {
                tracing::warn!(
                    source = %source,
                    needed,
                    max = source.max_candles(),
                    "Lookback exceeds source history cap; source will not contribute"
                );
            }
        }
        if !self.detection.pct_threshold.is_finite() || !self.detection.z_threshold.is_finite() {
            anyhow::bail!("detection thresholds must be finite");
        }
        if self.scheduler.max_concurrency == 0 {
            anyhow::bail!("scheduler.max_concurrency must be at least 1");
        }
        if self.scheduler.poll_interval_secs == 0 {
            anyhow::bail!("scheduler.poll_interval_secs must be positive");
        }
        if self.scheduler.asset_timeout_secs == 0 {
            anyhow::bail!("scheduler.asset_timeout_secs must be positive");
        }
        if !(1..=250).contains(&self.universe.size) {
            anyhow::bail!("universe.size must be between 1 and 250");
        }
        Ok(())
    }

    pub fn bucket_width(&self) -> anyhow::Result<BucketWidth> {
        BucketWidth::from_minutes(self.detection.bucket_minutes).ok_or_else(|| {
            anyhow::anyhow!(
                "detection.bucket_minutes = {} is not one of {:?}",
                self.detection.bucket_minutes,
                BucketWidth::SUPPORTED_MINUTES
            )
        })
    }

    /// Baseline length in buckets
    pub fn lookback_buckets(&self) -> usize {
        let minutes = self.detection.lookback_hours as usize * 60;
        minutes / self.detection.bucket_minutes.max(1) as usize
    }

    /// Candles asked of each source: baseline, current bucket and the open one
    pub fn candles_per_request(&self) -> usize {
        self.lookback_buckets() + 2
    }

    pub fn thresholds(&self) -> SpikeThresholds {
        SpikeThresholds {
            pct: self.detection.pct_threshold,
            z: self.detection.z_threshold,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.sources.retry;
        RetryPolicy::new(
            retry.max_attempts,
            Duration::from_millis(retry.base_delay_ms),
            Duration::from_millis(retry.max_delay_ms),
        )
        .jitter(retry.jitter_pct)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sources.request_timeout_secs)
    }

    /// Catalog cache lifetime, never longer than the universe refresh interval
    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(
            self.sources
                .catalog_ttl_secs
                .min(self.universe.refresh_interval_secs),
        )
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.alerts.cooldown_minutes as i64)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.poll_interval_secs)
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_secs(self.scheduler.asset_timeout_secs)
    }

    /// Time limit for one source's part of an asset evaluation
    ///
    /// Kept below the asset timeout so a hanging source drops out and the
    /// remaining sources still produce a result.
    pub fn source_timeout(&self) -> Duration {
        self.asset_timeout() * 3 / 4
    }

    pub fn universe_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.universe.refresh_interval_secs)
    }
}
