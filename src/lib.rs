//! volspike: cross-exchange trading volume spike monitor
//!
//! This library provides the core components for:
//! - Market catalogs and bucketed volume history from Binance, OKX and Bybit
//! - Cross-source volume aggregation with per-source failure isolation
//! - Baseline statistics and spike scoring
//! - Cooldown-gated alerting backed by SQLite
//! - Ranked universe discovery via CoinGecko
//! - A bounded-concurrency poll scheduler
//! - Telegram or console notifications

pub mod cli;
pub mod config;
pub mod cooldown;
pub mod market;
pub mod notify;
pub mod retry;
pub mod scheduler;
pub mod spike;
pub mod store;
pub mod telemetry;
pub mod universe;
pub mod volume;
