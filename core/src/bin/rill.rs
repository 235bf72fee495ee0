//! Rill CLI
//!
//! Renders a compiled template to stdout, optionally feeding variables from a
//! timed data script. Logs go to stderr so they never mix with the output.

use clap::Parser;
use rill_core::cli::{self, Cli};
use rill_core::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = Config::builder()
        .config_path(cli.config.clone())
        .build()
        .map(|config| config.logging.filter)
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run_cli_with_args(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
