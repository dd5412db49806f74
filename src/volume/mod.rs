//! Volume aggregation module
//!
//! Pulls a fixed-length volume history for one asset from every configured
//! source and sums the usable series into a single aggregate.

mod aggregator;
mod series;

pub use aggregator::{AggregateVolume, SourceOutcome, VolumeAggregator};
pub use series::{combine_series, completed_volumes, is_current, latest_close};
