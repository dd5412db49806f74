//! Top command implementation

use crate::config::Config;
use crate::notify::format_universe;
use crate::universe::{dedupe_assets, CoinGeckoClient, CoinGeckoConfig};
use clap::Args;

#[derive(Args, Debug)]
pub struct TopArgs {
    /// Override the configured universe size
    #[arg(long)]
    pub size: Option<usize>,
}

impl TopArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut gecko = CoinGeckoConfig::from_config(&config.universe, config.request_timeout());
        if let Some(size) = self.size {
            gecko.size = size.clamp(1, 250);
        }

        let client = CoinGeckoClient::new(gecko, config.retry_policy())?;
        let assets = dedupe_assets(client.fetch_top().await?);
        println!("{}", format_universe(&assets));
        Ok(())
    }
}
