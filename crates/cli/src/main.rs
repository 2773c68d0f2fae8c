//! duematch CLI
//!
//! Usage:
//!   duematch match --bills bills.json --transactions tx.json [--rules rules.toml]
//!   duematch detect --transactions tx.json [--existing subscriptions.json]
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    let output = match &cli.command {
        Commands::Match(args) => serde_json::to_string_pretty(&commands::cmd_match(args, &config)?)?,
        Commands::Detect(args) => serde_json::to_string_pretty(&commands::cmd_detect(args, &config)?)?,
    };
    println!("{output}");
    Ok(())
}
