//! One asset's pass through the pipeline

use crate::cooldown::CooldownGate;
use crate::market::BucketWidth;
use crate::notify::{format_alert, Notifier};
use crate::spike::{SpikeDetector, SpikeEvaluation};
use crate::store::{SpikeRecord, StoreError};
use crate::telemetry::{self, CounterMetric};
use crate::universe::Asset;
use crate::volume::VolumeAggregator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// What happened to one asset this tick
#[derive(Debug, Clone, PartialEq)]
pub enum AssetOutcome {
    /// No source contributed a usable series
    NoData,
    /// Scored, below both thresholds
    Quiet(SpikeEvaluation),
    /// Triggered inside the cooldown window
    Suppressed(SpikeEvaluation),
    /// Triggered, committed and sent
    Alerted(SpikeRecord),
}

/// Per-asset evaluation errors
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("State store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("Evaluation timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Admission limiter closed")]
    Shutdown,
}

/// Aggregate, score, gate and emit for a single asset
pub struct AssetEvaluator {
    aggregator: VolumeAggregator,
    detector: SpikeDetector,
    gate: CooldownGate,
    notifier: Arc<dyn Notifier>,
}

impl AssetEvaluator {
    pub fn new(
        aggregator: VolumeAggregator,
        detector: SpikeDetector,
        gate: CooldownGate,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            aggregator,
            detector,
            gate,
            notifier,
        }
    }

    pub fn width(&self) -> BucketWidth {
        self.aggregator.width()
    }

    /// Evaluate `asset` with buckets completed by `now`
    ///
    /// The cooldown is only consulted after a positive detection. A
    /// suppressed spike leaves no trace in the store.
    pub async fn evaluate(
        &self,
        asset: &Asset,
        now: DateTime<Utc>,
    ) -> Result<AssetOutcome, EvaluationError> {
        let ticker = asset.ticker.as_str();

        let Some(aggregate) = self.aggregator.aggregate(ticker, now).await else {
            tracing::debug!(ticker, "No source data");
            return Ok(AssetOutcome::NoData);
        };

        let eval = self
            .detector
            .evaluate(aggregate.current, &aggregate.baseline)
            .with_sources(aggregate.sources);

        if !eval.triggered {
            tracing::debug!(
                ticker,
                current = eval.current_volume,
                pct = eval.percent_delta,
                z = eval.z_score,
                "Quiet"
            );
            return Ok(AssetOutcome::Quiet(eval));
        }

        if !self.gate.check(ticker, now).await? {
            telemetry::increment(CounterMetric::AlertsSuppressed);
            tracing::debug!(ticker, pct = eval.percent_delta, "Spike suppressed by cooldown");
            return Ok(AssetOutcome::Suppressed(eval));
        }

        let record = SpikeRecord::from_evaluation(ticker, asset.name.as_str(), &eval, now);
        self.gate.commit_detached(&record).await?;
        telemetry::increment(CounterMetric::AlertsEmitted);
        tracing::info!(
            alert_id = %record.alert_id,
            ticker,
            pct = record.percent_delta,
            z = record.z_score,
            current = record.current_volume,
            sources = record.sources.len(),
            "Volume spike"
        );

        // committed already; a failed send is not retried
        if let Err(e) = self.notifier.emit(&format_alert(&record, self.width())).await {
            tracing::warn!(
                alert_id = %record.alert_id,
                ticker,
                error = %e,
                "Alert delivery failed"
            );
        }

        Ok(AssetOutcome::Alerted(record))
    }
}
