//! Platform-appropriate locations for configuration, data and screenshots
//!
//! Uses the directories crate:
//! - Linux: `~/.config/scenario-runner/`, `~/.local/share/scenario-runner/`
//! - macOS: `~/Library/Application Support/scenario-runner/`
//! - Windows: `%APPDATA%\scenario-runner\`

use std::path::PathBuf;

/// Name used for the application directories
const APP_NAME: &str = "scenario-runner";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Directory holding user scenario files (`<name>.yaml`)
pub fn scenarios_dir() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("scenarios"))
}

/// Get the data directory path
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Path of the persisted target list
pub fn targets_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("targets.json"))
}

/// Default root for screenshot runs
pub fn screenshot_root() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("screenshots"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("logs"))
}

/// The user's home directory
pub fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}
