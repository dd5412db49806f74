//! CLI interface for volspike
//!
//! Provides subcommands for:
//! - `run`: Start the spike monitor
//! - `status`: Show recent spikes
//! - `top`: Show the ranked universe
//! - `config`: Show the effective configuration

mod run;
mod status;
mod top;

pub use run::RunArgs;
pub use status::StatusArgs;
pub use top::TopArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "volspike")]
#[command(about = "Cross-exchange trading volume spike monitor")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the spike monitor
    Run(RunArgs),
    /// Show recent spikes
    Status(StatusArgs),
    /// Show the ranked asset universe
    Top(TopArgs),
    /// Show the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_once() {
        let cli = Cli::try_parse_from(["volspike", "run", "--once"]).unwrap();
        assert_eq!(cli.config, "config.toml");
        assert!(matches!(cli.command, Commands::Run(RunArgs { once: true })));
    }

    #[test]
    fn test_parse_status_limit() {
        let cli =
            Cli::try_parse_from(["volspike", "-c", "alt.toml", "status", "--limit", "3"]).unwrap();
        assert_eq!(cli.config, "alt.toml");
        let Commands::Status(args) = cli.command else {
            panic!("expected status");
        };
        assert_eq!(args.limit, 3);
    }

    #[test]
    fn test_status_default_limit() {
        let cli = Cli::try_parse_from(["volspike", "status"]).unwrap();
        let Commands::Status(args) = cli.command else {
            panic!("expected status");
        };
        assert_eq!(args.limit, 10);
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
