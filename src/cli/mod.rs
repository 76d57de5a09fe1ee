//! CLI interface for hotlist-trader
//!
//! Provides subcommands for:
//! - `run`: Start the bot
//! - `scan`: One discovery pass
//! - `status`: Show persisted state
//! - `config`: Show configuration

mod run;
mod scan;
mod status;

pub use run::RunArgs;
pub use scan::ScanArgs;
pub use status::show_status;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hotlist-trader")]
#[command(about = "Momentum spot trading bot with a multi-timeframe hotlist")]
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
    /// Start the bot
    Run(RunArgs),
    /// Run one discovery pass and print the universe
    Scan(ScanArgs),
    /// Show persisted balance, breaker and open positions
    Status,
    /// Show configuration
    Config,
}
