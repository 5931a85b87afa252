//! Logging and tracing configuration
//!
//! Short commands log compactly to stderr. Automation runs additionally log
//! to a file, since they run for minutes and their output scrolls away.

use std::path::PathBuf;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer as _,
};

use super::paths;

/// Initialize tracing for short CLI commands (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scenario_runner=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for automation runs (file + stderr logging)
///
/// The file lives at `<data_dir>/logs/runner.log` and receives full details,
/// including the automation server's own output at DEBUG level.
pub fn init_run() -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("scenario_runner=debug,automation_server=debug,info")
    });

    if let Some(log_file) = run_log_path() {
        let opened = log_file
            .parent()
            .map(std::fs::create_dir_all)
            .transpose()
            .and_then(|_| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_file)
            });

        match opened {
            Ok(file) => {
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true);

                // stderr only shows progress-level events
                let stderr_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact()
                    .with_filter(tracing_subscriber::filter::LevelFilter::INFO);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(file_layer)
                    .with(stderr_layer)
                    .init();

                return Some(log_file);
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file: {}", e);
            }
        }
    }

    // Fallback: stderr only
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();

    None
}

/// Get the path to the run log file
pub fn run_log_path() -> Option<PathBuf> {
    paths::log_dir().map(|d| d.join("runner.log"))
}
