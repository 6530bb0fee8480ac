use anyhow::{Context, Result};
use clap::Parser;

use roster_cli::cli::Cli;
use roster_cli::cli::commands::roster::handle_command;
use roster_cli::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);

    let level = config.resilience().monitoring.log_level.as_filter();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    log::debug!(
        "Using roster store {} (collection '{}')",
        config.api.base_url,
        config.api.collection
    );

    handle_command(cli.command, &config).await
}
