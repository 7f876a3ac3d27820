use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mailmirror", version, about = "Mirror Apple Mail threads into Markdown documents")]
pub struct Cli {
    /// Path to config.toml (default: OS config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync threads with new messages since the last run
    Sync {
        /// How many days back to sync on first run (default: 30)
        #[arg(long, value_name = "N")]
        days: Option<u32>,
    },
}
