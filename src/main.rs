use clap::Parser;
use volspike::cli::{Cli, Commands};
use volspike::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });
    config.apply_env();

    // Initialize telemetry
    volspike::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting spike monitor");
            args.execute(&config).await?;
        }
        Commands::Status(args) => {
            args.execute(&config).await?;
        }
        Commands::Top(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            let mut shown = config.clone();
            if shown.notify.telegram_token.is_some() {
                shown.notify.telegram_token = Some("<redacted>".to_string());
            }
            println!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}
