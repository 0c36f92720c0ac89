//! ddl_sync command-line interface

use anyhow::Context;
use clap::Parser;
use tracing::Level;

use ddl_sync::cli::{Cli, Command};
use ddl_sync::commands;
use ddl_sync::config;
use ddl_sync::utils::logging::{init_default_logging, init_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    match cli.command {
        Command::Init(args) => commands::init(&cli.config, args)?,
        Command::Diff(args) => commands::diff(&cli.config, args).await?,
        Command::Migrate(args) => commands::migrate(&cli.config, args).await?,
    }

    Ok(())
}

/// `--verbose` wins; otherwise use the config file's logging section when it
/// can be read, falling back to INFO on stdout
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    if cli.verbose {
        return init_default_logging(Level::DEBUG).context("Failed to initialize logging");
    }

    match config::load_from_file(&cli.config) {
        Ok(cfg) if cfg.logging.is_some() => {
            init_logging(&cfg.logging).context("Failed to initialize logging")
        }
        _ => init_default_logging(Level::INFO).context("Failed to initialize logging"),
    }
}
