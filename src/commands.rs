//! CLI command definitions
//!
//! Defines the clap commands for the scenario runner CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scenarios of one or more targets concurrently
    Run {
        /// Target ids to run
        ids: Vec<u64>,

        /// Run every configured target
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// Execute against an in-process mock device (no server, no emulator)
        #[arg(long)]
        dry_run: bool,
    },

    /// Target management
    #[command(subcommand)]
    Targets(TargetCommands),

    /// Print the steps of a scenario
    Scenario {
        /// Scenario name (built-in or `<config_dir>/scenarios/<name>.yaml`); lists names when omitted
        name: Option<String>,
    },

    /// List the screenshot runs of a target, newest first
    Runs {
        /// Target id
        id: u64,
    },

    /// Compare the screenshots of two runs
    Diff {
        /// Left run directory
        left: PathBuf,

        /// Right run directory
        right: PathBuf,

        /// Hide files classified as SAME
        #[arg(long)]
        diff_only: bool,

        /// Ignore screenshots of steps without a label
        #[arg(long)]
        exclude_auto_named: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the per-pixel difference of two screenshots to a temporary PNG
    Visualize {
        /// Left screenshot
        left: PathBuf,

        /// Right screenshot
        right: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum TargetCommands {
    /// List configured targets
    List,

    /// Add a target
    Add {
        /// Display name (also the screenshot directory name)
        name: String,

        /// Scenario to run
        #[arg(long)]
        scenario: String,

        /// Device preset name (see `targets presets`)
        #[arg(long, default_value = "Pixel 8 Pro")]
        device: String,

        /// Driver server host
        #[arg(long)]
        host: Option<String>,

        /// Driver server port
        #[arg(long)]
        port: Option<u16>,

        /// Device serial
        #[arg(long)]
        udid: Option<String>,

        /// Application package to install
        #[arg(long)]
        app: Option<PathBuf>,
    },

    /// Change fields of an existing target
    Edit {
        /// Target id
        id: u64,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// Scenario to run
        #[arg(long)]
        scenario: Option<String>,

        /// Device preset name (see `targets presets`)
        #[arg(long)]
        device: Option<String>,

        /// Driver server host
        #[arg(long)]
        host: Option<String>,

        /// Driver server port
        #[arg(long)]
        port: Option<u16>,

        /// Device serial
        #[arg(long)]
        udid: Option<String>,

        /// Application package to install
        #[arg(long)]
        app: Option<PathBuf>,
    },

    /// Remove a target
    Remove {
        /// Target id
        id: u64,
    },

    /// List device presets
    Presets,
}
