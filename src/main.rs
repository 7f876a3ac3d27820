use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mailmirror::cli::{Cli, Commands};

/// Diagnostics go to stderr; RUST_LOG overrides the default level.
fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Sync { days } => mailmirror::sync::run(days, cli.config.as_deref()),
    }
}
