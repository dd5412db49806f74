//! Poll scheduler
//!
//! Drives the pipeline on a fixed cadence: refresh the universe when stale,
//! evaluate every asset with bounded concurrency, join, then sleep out the
//! rest of the interval.

mod evaluator;

pub use evaluator::{AssetEvaluator, AssetOutcome, EvaluationError};

use crate::config::Config;
use crate::notify::{format_warning, Notifier};
use crate::store::StoreError;
use crate::telemetry::{self, CounterMetric, GaugeMetric, LatencyMetric};
use crate::universe::{RefreshOutcome, UniverseTracker};
use chrono::Utc;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Loop-fatal errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("State store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    RefreshingUniverse,
    Evaluating { assets: usize },
    Sleeping,
}

/// Counts for one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub assets: usize,
    pub alerted: usize,
    pub suppressed: usize,
    pub quiet: usize,
    pub no_data: usize,
    pub timed_out: usize,
    /// Evaluations that never started (limiter closed)
    pub failed: usize,
    pub panicked: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: &AssetOutcome) {
        match outcome {
            AssetOutcome::NoData => self.no_data += 1,
            AssetOutcome::Quiet(_) => self.quiet += 1,
            AssetOutcome::Suppressed(_) => self.suppressed += 1,
            AssetOutcome::Alerted(_) => self.alerted += 1,
        }
    }

    fn record_abandoned(&mut self, error: &EvaluationError) {
        match error {
            EvaluationError::TimedOut(_) => self.timed_out += 1,
            _ => self.failed += 1,
        }
    }
}

/// Loop timing and admission bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    pub max_concurrency: usize,
    pub asset_timeout: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_concurrency: config.scheduler.max_concurrency,
            asset_timeout: config.asset_timeout(),
        }
    }
}

pub struct PollScheduler {
    universe: Arc<UniverseTracker>,
    evaluator: Arc<AssetEvaluator>,
    notifier: Arc<dyn Notifier>,
    settings: SchedulerSettings,
    limiter: Arc<Semaphore>,
    phase: watch::Sender<SchedulerPhase>,
}

impl PollScheduler {
    pub fn new(
        universe: Arc<UniverseTracker>,
        evaluator: Arc<AssetEvaluator>,
        notifier: Arc<dyn Notifier>,
        settings: SchedulerSettings,
    ) -> Self {
        let limiter = Arc::new(Semaphore::new(settings.max_concurrency.max(1)));
        let (phase, _) = watch::channel(SchedulerPhase::Idle);
        Self {
            universe,
            evaluator,
            notifier,
            settings,
            limiter,
            phase,
        }
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions
    pub fn subscribe(&self) -> watch::Receiver<SchedulerPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: SchedulerPhase) {
        self.phase.send_replace(phase);
    }

    /// Run one refresh-and-evaluate pass
    ///
    /// Per-asset panics and timeouts are counted, not propagated. A store
    /// failure aborts the remaining tasks and is returned.
    pub async fn tick(&self) -> Result<TickSummary, SchedulerError> {
        let started = Instant::now();

        self.set_phase(SchedulerPhase::RefreshingUniverse);
        if let RefreshOutcome::Failed {
            error,
            first_in_streak: true,
        } = self.universe.refresh_if_stale().await
        {
            self.warn(&format!("Universe refresh failed: {error}")).await;
        }

        let assets = self.universe.assets().await;
        self.set_phase(SchedulerPhase::Evaluating {
            assets: assets.len(),
        });

        let now = Utc::now();
        let mut tasks = JoinSet::new();
        for asset in assets.iter().cloned() {
            let limiter = self.limiter.clone();
            let evaluator = self.evaluator.clone();
            let timeout = self.settings.asset_timeout;

            tasks.spawn(async move {
                let Ok(_permit) = limiter.acquire_owned().await else {
                    return (asset, Err(EvaluationError::Shutdown));
                };
                let eval_started = Instant::now();
                let result = tokio::time::timeout(timeout, evaluator.evaluate(&asset, now))
                    .await
                    .unwrap_or(Err(EvaluationError::TimedOut(timeout)));
                telemetry::record_latency(LatencyMetric::AssetEvaluation, eval_started.elapsed());
                (asset, result)
            });
        }

        let mut summary = TickSummary {
            assets: assets.len(),
            ..TickSummary::default()
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => summary.record(&outcome),
                Ok((asset, Err(EvaluationError::Store(e)))) => {
                    tracing::error!(ticker = %asset.ticker, error = %e, "State store failure");
                    tasks.shutdown().await;
                    self.set_phase(SchedulerPhase::Idle);
                    return Err(SchedulerError::StoreUnavailable(e));
                }
                Ok((asset, Err(e))) => {
                    summary.record_abandoned(&e);
                    telemetry::increment(CounterMetric::AssetFailures);
                    tracing::warn!(
                        ticker = %asset.ticker,
                        error = %e,
                        "Asset evaluation abandoned"
                    );
                }
                Err(e) => {
                    summary.panicked += 1;
                    telemetry::increment(CounterMetric::AssetFailures);
                    tracing::error!(error = %e, "Asset evaluation panicked");
                }
            }
        }

        telemetry::set_gauge(GaugeMetric::LastTickAlerts, summary.alerted as f64);
        telemetry::record_latency(LatencyMetric::Tick, started.elapsed());
        tracing::info!(
            assets = summary.assets,
            alerted = summary.alerted,
            suppressed = summary.suppressed,
            quiet = summary.quiet,
            no_data = summary.no_data,
            timed_out = summary.timed_out,
            failed = summary.failed,
            panicked = summary.panicked,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tick complete"
        );
        Ok(summary)
    }

    /// Tick until `cancel` fires or the store becomes unavailable
    ///
    /// Cancelling mid-tick drops the task set, which aborts in-flight
    /// evaluations.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SchedulerError> {
        tracing::info!(
            poll_secs = self.settings.poll_interval.as_secs(),
            max_concurrency = self.settings.max_concurrency,
            "Scheduler started"
        );

        loop {
            let started = Instant::now();
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = AssertUnwindSafe(self.tick()).catch_unwind() => result,
            };

            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Scheduler stopping");
                    self.warn(&e.to_string()).await;
                    return Err(e);
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(error = %message, "Tick panicked");
                    self.warn(&message).await;
                }
            }

            self.set_phase(SchedulerPhase::Sleeping);
            let wait = self.settings.poll_interval.saturating_sub(started.elapsed());
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.set_phase(SchedulerPhase::Idle);
        tracing::info!("Scheduler stopped");
        Ok(())
    }

    async fn warn(&self, message: &str) {
        if let Err(e) = self.notifier.emit(&format_warning(message)).await {
            tracing::warn!(error = %e, "Warning delivery failed");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
