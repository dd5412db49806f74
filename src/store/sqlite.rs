//! SQLite-backed state store

use super::{SpikeRecord, StateStore, StoreError};
use crate::market::MarketSource;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS alert_state (
    ticker TEXT PRIMARY KEY,
    last_alert_ts INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS spike_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_id TEXT NOT NULL,
    ts INTEGER NOT NULL,
    ticker TEXT NOT NULL,
    name TEXT NOT NULL,
    percent_delta REAL NOT NULL,
    z_score REAL NOT NULL,
    current_volume REAL NOT NULL,
    baseline_mean REAL NOT NULL,
    baseline_std REAL NOT NULL,
    sources TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_spike_history_ts ON spike_history (ts DESC);
"#;

const UPSERT_ALERT: &str = "INSERT INTO alert_state (ticker, last_alert_ts) VALUES (?1, ?2)
     ON CONFLICT(ticker) DO UPDATE SET last_alert_ts = excluded.last_alert_ts";

/// State store in a single SQLite database
///
/// Timestamps are stored as epoch milliseconds.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        tracing::info!(path = %path.display(), "Opened state store");
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn row_to_record(
        row: &Row<'_>,
    ) -> rusqlite::Result<(String, i64, String, String, [f64; 5], String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            [row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?],
            row.get(9)?,
        ))
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {ms}")))
}

fn encode_sources(sources: &[MarketSource]) -> String {
    sources
        .iter()
        .map(MarketSource::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_sources(s: &str) -> Result<Vec<MarketSource>, StoreError> {
    s.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().map_err(StoreError::Corrupt))
        .collect()
}

impl StateStore for SqliteStore {
    fn last_alert(&self, ticker: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.lock()?;
        let ts: Option<i64> = conn
            .query_row(
                "SELECT last_alert_ts FROM alert_state WHERE ticker = ?1",
                params![ticker],
                |row| row.get(0),
            )
            .optional()?;
        ts.map(from_millis).transpose()
    }

    fn upsert_alert(&self, ticker: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(UPSERT_ALERT, params![ticker, at.timestamp_millis()])?;
        Ok(())
    }

    fn commit_alert(&self, record: &SpikeRecord) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO spike_history (
                alert_id, ts, ticker, name, percent_delta, z_score,
                current_volume, baseline_mean, baseline_std, sources
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.alert_id.to_string(),
                record.timestamp.timestamp_millis(),
                record.ticker,
                record.name,
                record.percent_delta,
                record.z_score,
                record.current_volume,
                record.baseline_mean,
                record.baseline_std,
                encode_sources(&record.sources),
            ],
        )?;
        tx.execute(
            UPSERT_ALERT,
            params![record.ticker, record.timestamp.timestamp_millis()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn recent_spikes(&self, limit: usize) -> Result<Vec<SpikeRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT alert_id, ts, ticker, name, percent_delta, z_score,
                    current_volume, baseline_mean, baseline_std, sources
             FROM spike_history ORDER BY ts DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(alert_id, ts, ticker, name, stats, sources)| {
                Ok(SpikeRecord {
                    alert_id: Uuid::parse_str(&alert_id)
                        .map_err(|e| StoreError::Corrupt(e.to_string()))?,
                    timestamp: from_millis(ts)?,
                    ticker,
                    name,
                    percent_delta: stats[0],
                    z_score: stats[1],
                    current_volume: stats[2],
                    baseline_mean: stats[3],
                    baseline_std: stats[4],
                    sources: decode_sources(&sources)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(ticker: &str, ts: DateTime<Utc>) -> SpikeRecord {
        SpikeRecord {
            alert_id: Uuid::new_v4(),
            timestamp: ts,
            ticker: ticker.to_string(),
            name: format!("{ticker} coin"),
            percent_delta: 900.0,
            z_score: 0.0,
            current_volume: 2000.0,
            baseline_mean: 200.0,
            baseline_std: 0.0,
            sources: vec![MarketSource::Binance, MarketSource::Okx],
        }
    }

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_last_alert_absent() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.last_alert("BTC").unwrap().is_none());
    }

    #[test]
    fn test_upsert_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_alert("BTC", ts(1_000)).unwrap();
        store.upsert_alert("BTC", ts(5_000)).unwrap();

        assert_eq!(store.last_alert("BTC").unwrap(), Some(ts(5_000)));

        let conn = store.lock().unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM alert_state", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_commit_alert_writes_both() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rec = record("ETH", ts(1_700_000_000_123));
        store.commit_alert(&rec).unwrap();

        assert_eq!(store.last_alert("ETH").unwrap(), Some(rec.timestamp));
        let spikes = store.recent_spikes(10).unwrap();
        assert_eq!(spikes, vec![rec]);
    }

    #[test]
    fn test_history_is_append_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        let base = ts(1_700_000_000_000);
        store.commit_alert(&record("SOL", base)).unwrap();
        store.commit_alert(&record("SOL", base + Duration::minutes(31))).unwrap();

        assert_eq!(store.recent_spikes(10).unwrap().len(), 2);
        assert_eq!(
            store.last_alert("SOL").unwrap(),
            Some(base + Duration::minutes(31))
        );
    }

    #[test]
    fn test_recent_spikes_newest_first_and_limited() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (i, ticker) in ["A", "B", "C", "D"].iter().enumerate() {
            store.commit_alert(&record(ticker, ts(1_000 * (i as i64 + 1)))).unwrap();
        }

        let tickers: Vec<String> = store
            .recent_spikes(3)
            .unwrap()
            .into_iter()
            .map(|r| r.ticker)
            .collect();
        assert_eq!(tickers, vec!["D", "C", "B"]);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.commit_alert(&record("BTC", ts(42_000))).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.last_alert("BTC").unwrap(), Some(ts(42_000)));
        assert_eq!(reopened.recent_spikes(1).unwrap()[0].ticker, "BTC");
    }

    #[test]
    fn test_source_encoding() {
        let encoded = encode_sources(&[MarketSource::Okx, MarketSource::Bybit]);
        assert_eq!(encoded, "okx,bybit");
        assert_eq!(
            decode_sources(&encoded).unwrap(),
            vec![MarketSource::Okx, MarketSource::Bybit]
        );
        assert!(decode_sources("").unwrap().is_empty());
        assert!(decode_sources("kraken").is_err());
    }
}
