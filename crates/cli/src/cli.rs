//! Argument definitions. Command bodies live in `commands`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// duematch - reconcile bank transactions against expected bills
#[derive(Parser)]
#[command(name = "duematch")]
#[command(about = "Match bank transactions to bills and detect subscriptions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration (TOML with [matcher] and [subscriptions] tables)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find the best transaction for each bill
    Match(MatchArgs),

    /// Detect recurring charges in transaction history
    Detect(DetectArgs),
}

#[derive(Args)]
pub struct MatchArgs {
    /// JSON array of bills
    #[arg(short, long)]
    pub bills: PathBuf,

    /// JSON array of transactions
    #[arg(short, long)]
    pub transactions: PathBuf,

    /// Payment rules (.json or .toml)
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Merchant alias table (.json or .toml)
    #[arg(long)]
    pub aliases: Option<PathBuf>,

    /// Recurring patterns (.json or .toml)
    #[arg(long)]
    pub patterns: Option<PathBuf>,

    /// Match each bill on its own instead of assigning transactions exclusively
    #[arg(long)]
    pub independent: bool,
}

#[derive(Args)]
pub struct DetectArgs {
    /// JSON array of transactions
    #[arg(short, long)]
    pub transactions: PathBuf,

    /// JSON array of names of subscriptions already tracked
    #[arg(long)]
    pub existing: Option<PathBuf>,

    /// Merchant alias table used for categories (.json or .toml)
    #[arg(long)]
    pub aliases: Option<PathBuf>,
}
