//! Status command implementation

use crate::config::Config;
use crate::notify::format_status;
use crate::store::{SqliteStore, StateStore};
use clap::Args;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of recent spikes to show
    #[arg(long, default_value = "10")]
    pub limit: usize,
}

impl StatusArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = SqliteStore::open(&config.store.path)?;
        let spikes = store.recent_spikes(self.limit)?;
        println!("{}", format_status(&spikes));
        Ok(())
    }
}
