//! Baseline statistics and spike scoring

use super::{SpikeEvaluation, SpikeThresholds};

/// Fewest baseline buckets that produce a score
pub const MIN_BASELINE_BUCKETS: usize = 5;

/// Scores the current bucket against its baseline
///
/// Pure: the same inputs always give the same evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeDetector {
    thresholds: SpikeThresholds,
}

impl SpikeDetector {
    pub fn new(thresholds: SpikeThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> SpikeThresholds {
        self.thresholds
    }

    /// Evaluate `current` against `baseline`
    ///
    /// Too little history or a non-positive baseline mean yields a
    /// non-triggered result with zeroed statistics.
    pub fn evaluate(&self, current: f64, baseline: &[f64]) -> SpikeEvaluation {
        if baseline.len() < MIN_BASELINE_BUCKETS {
            return SpikeEvaluation::quiet(current);
        }

        let mean = mean(baseline);
        if mean.is_nan() || mean <= 0.0 {
            return SpikeEvaluation::quiet(current);
        }
        let std = sample_std(baseline, mean);

        let percent_delta = (current - mean) / mean * 100.0;
        let z_score = if std > 0.0 { (current - mean) / std } else { 0.0 };
        let triggered =
            percent_delta >= self.thresholds.pct || z_score >= self.thresholds.z;

        SpikeEvaluation {
            triggered,
            percent_delta,
            z_score,
            baseline_mean: mean,
            baseline_std: std,
            current_volume: current,
            contributing_sources: Vec::new(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); zero for a single value
fn sample_std(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}
