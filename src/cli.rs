use std::path::PathBuf;

use clap::Parser;

/// Mirror the Alexa shopping list onto a Trello list.
#[derive(Debug, Parser)]
#[command(name = "alexa-trello", version)]
pub struct Cli {
    /// Run a single poll cycle and exit
    #[arg(short = 's', long)]
    pub single_run: bool,

    /// Path to the TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Delete items from the shopping list once their card is created
    #[arg(long)]
    pub clear_source: bool,
}
