//! Per-asset alert cooldown

use crate::store::{SpikeRecord, StateStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Whether `cooldown` has fully elapsed since `last`
///
/// No prior alert is always eligible. The boundary is inclusive.
pub fn cooldown_elapsed(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> bool {
    match last {
        None => true,
        Some(last) => now - last >= cooldown,
    }
}

/// Admits or suppresses triggered spikes based on the time since each
/// ticker's last alert
#[derive(Clone)]
pub struct CooldownGate {
    store: Arc<dyn StateStore>,
    cooldown: Duration,
}

impl CooldownGate {
    pub fn new(store: Arc<dyn StateStore>, cooldown: Duration) -> Self {
        Self { store, cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn is_eligible(&self, ticker: &str) -> Result<bool, StoreError> {
        self.is_eligible_at(ticker, Utc::now())
    }

    pub fn is_eligible_at(&self, ticker: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let last = self.store.last_alert(ticker)?;
        Ok(cooldown_elapsed(last, now, self.cooldown))
    }

    /// Record an alert for `ticker` now
    pub fn mark_alerted(&self, ticker: &str) -> Result<(), StoreError> {
        self.mark_alerted_at(ticker, Utc::now())
    }

    pub fn mark_alerted_at(&self, ticker: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.store.upsert_alert(ticker, at)
    }

    /// Persist an admitted spike together with its alert time
    pub fn commit(&self, record: &SpikeRecord) -> Result<(), StoreError> {
        self.store.commit_alert(record)
    }

    /// `is_eligible_at` on the blocking pool
    pub async fn check(&self, ticker: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let gate = self.clone();
        let ticker = ticker.to_string();
        run_blocking(move || gate.is_eligible_at(&ticker, now)).await
    }

    /// `commit` on the blocking pool
    ///
    /// The transaction runs to completion even if the caller is dropped.
    pub async fn commit_detached(&self, record: &SpikeRecord) -> Result<(), StoreError> {
        let gate = self.clone();
        let record = record.clone();
        run_blocking(move || gate.commit(&record)).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
