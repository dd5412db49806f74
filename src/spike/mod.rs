//! Spike detection module
//!
//! Scores the most recent volume bucket against the trailing baseline. Either a
//! large relative jump or a large deviation in noise terms qualifies as a spike.

mod detector;

pub use detector::{SpikeDetector, MIN_BASELINE_BUCKETS};

use crate::market::MarketSource;
use serde::{Deserialize, Serialize};

/// Trigger levels; crossing either one is a spike
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeThresholds {
    /// Percent above the baseline mean
    pub pct: f64,
    /// Standard deviations above the baseline mean
    pub z: f64,
}

/// Result of scoring one asset in one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeEvaluation {
    pub triggered: bool,
    pub percent_delta: f64,
    pub z_score: f64,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub current_volume: f64,
    pub contributing_sources: Vec<MarketSource>,
}

impl SpikeEvaluation {
    /// Non-triggered result with zeroed statistics
    pub fn quiet(current_volume: f64) -> Self {
        Self {
            triggered: false,
            percent_delta: 0.0,
            z_score: 0.0,
            baseline_mean: 0.0,
            baseline_std: 0.0,
            current_volume,
            contributing_sources: Vec::new(),
        }
    }

    /// Attach the sources the aggregate came from
    pub fn with_sources(mut self, sources: Vec<MarketSource>) -> Self {
        self.contributing_sources = sources;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_evaluation() {
        let eval = SpikeEvaluation::quiet(42.0);
        assert!(!eval.triggered);
        assert_eq!(eval.current_volume, 42.0);
        assert!(eval.contributing_sources.is_empty());
    }

    #[test]
    fn test_with_sources() {
        let eval = SpikeEvaluation::quiet(1.0).with_sources(vec![MarketSource::Okx]);
        assert_eq!(eval.contributing_sources, vec![MarketSource::Okx]);
    }
}
