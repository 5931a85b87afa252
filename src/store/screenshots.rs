//! Screenshot run directories
//!
//! Layout: `<root>/<target name>/<timestamp>_<app>/<label>.png`, one
//! directory per run.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Timestamp format used in run directory names
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Directory for a run started at `started`
pub fn run_dir(root: &Path, target_name: &str, started: DateTime<Local>, app_identifier: &str) -> PathBuf {
    root.join(target_name).join(format!(
        "{}_{}",
        started.format(RUN_TIMESTAMP_FORMAT),
        app_identifier
    ))
}

/// One recorded run of a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    pub name: String,
    pub path: PathBuf,
    pub screenshot_count: usize,
}

/// Runs recorded for a target, newest first
///
/// Run names start with a sortable timestamp, so name order is time order.
pub fn list_runs(root: &Path, target_name: &str) -> Vec<RunDir> {
    let Ok(entries) = std::fs::read_dir(root.join(target_name)) else {
        return Vec::new();
    };

    let mut runs: Vec<RunDir> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| {
            let path = entry.path();
            let screenshot_count = std::fs::read_dir(&path)
                .map(|files| {
                    files
                        .filter_map(|f| f.ok())
                        .filter(|f| f.path().extension().is_some_and(|ext| ext == "png"))
                        .count()
                })
                .unwrap_or(0);
            RunDir {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
                screenshot_count,
            }
        })
        .collect();

    runs.sort_by(|a, b| b.name.cmp(&a.name));
    runs
}
