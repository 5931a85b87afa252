//! Scenario Runner - scripted mobile UI automation with per-step screenshots
//!
//! Runs scenarios against Android targets through a shared Appium server and
//! compares the screenshots of two runs.

use clap::Parser;
use scenario_runner::common::logging;
use scenario_runner::{cli, commands};
use commands::Commands;

#[derive(Parser)]
#[command(name = "scenario-runner", about = "Scenario-driven mobile UI automation")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Run { .. }) {
        if let Some(path) = logging::init_run() {
            tracing::debug!(path = %path.display(), "Logging to file");
        }
    } else {
        logging::init_cli();
    }

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
