//! Persisted alert state
//!
//! Two durable structures: a per-ticker cooldown record (upserted) and an
//! append-only log of emitted spikes.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::market::MarketSource;
use crate::spike::SpikeEvaluation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store lock poisoned")]
    Poisoned,
    #[error("Corrupt row: {0}")]
    Corrupt(String),
    #[error("Store task failed: {0}")]
    Task(String),
}

/// One emitted alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeRecord {
    /// Correlates log lines, the stored row and the sent message
    pub alert_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub ticker: String,
    pub name: String,
    pub percent_delta: f64,
    pub z_score: f64,
    pub current_volume: f64,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub sources: Vec<MarketSource>,
}

impl SpikeRecord {
    /// Build the record for a triggered evaluation
    pub fn from_evaluation(
        ticker: impl Into<String>,
        name: impl Into<String>,
        eval: &SpikeEvaluation,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            timestamp,
            ticker: ticker.into(),
            name: name.into(),
            percent_delta: eval.percent_delta,
            z_score: eval.z_score,
            current_volume: eval.current_volume,
            baseline_mean: eval.baseline_mean,
            baseline_std: eval.baseline_std,
            sources: eval.contributing_sources.clone(),
        }
    }
}

/// Durable cooldown and spike-history storage
///
/// Implementations must tolerate concurrent calls from many asset tasks.
pub trait StateStore: Send + Sync {
    /// Last alert time for `ticker`, if any
    fn last_alert(&self, ticker: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Insert or overwrite the last alert time for `ticker`
    fn upsert_alert(&self, ticker: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Append `record` to the history and set its ticker's alert time
    ///
    /// Both writes commit together. The history row goes first; the alert
    /// time, which gates the next alert, goes last.
    fn commit_alert(&self, record: &SpikeRecord) -> Result<(), StoreError>;

    /// Most recent spikes, newest first
    fn recent_spikes(&self, limit: usize) -> Result<Vec<SpikeRecord>, StoreError>;
}
