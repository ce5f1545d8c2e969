use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use insight_admin::cli::{run_command, Cli};
use insight_admin::config::Config;
use insight_admin::Console;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.trim_end_matches('/').to_string();
    }

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        api = %config.api.base_url,
        "Starting insight-admin"
    );

    let console = Console::new(&config)?;
    run_command(&cli, &console).await
}
