//! Prometheus metrics

use crate::market::MarketSource;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Alerts emitted
    AlertsEmitted,
    /// Triggered spikes held back by the cooldown
    AlertsSuppressed,
    /// Asset evaluations that panicked, timed out or errored
    AssetFailures,
    /// Failed universe refreshes
    UniverseRefreshFailures,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Assets in the current universe
    UniverseSize,
    /// Alerts emitted by the last tick
    LastTickAlerts,
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Whole scheduler tick
    Tick,
    /// One asset's evaluation
    AssetEvaluation,
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::AlertsEmitted => "volspike_alerts_total",
            CounterMetric::AlertsSuppressed => "volspike_alerts_suppressed_total",
            CounterMetric::AssetFailures => "volspike_asset_failures_total",
            CounterMetric::UniverseRefreshFailures => "volspike_universe_refresh_failures_total",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::UniverseSize => "volspike_universe_size",
            GaugeMetric::LastTickAlerts => "volspike_last_tick_alerts",
        }
    }
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::Tick => "volspike_tick_duration_ms",
            LatencyMetric::AssetEvaluation => "volspike_asset_eval_duration_ms",
        }
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    counter!(metric.name()).increment(1);
}

/// Count a source call that failed after retries
pub fn record_source_failure(source: MarketSource) {
    counter!("volspike_source_failures_total", "source" => source.as_str()).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    gauge!(metric.name()).set(value);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Serve `/metrics` on `port`; must be called inside a tokio runtime
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;
    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
