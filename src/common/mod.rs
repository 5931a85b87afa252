//! Common utilities shared by the CLI and the automation core

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Whether a line of server output carries the readiness banner
pub fn is_ready_line(line: &str, banner: &str) -> bool {
    !banner.is_empty() && line.contains(banner)
}
