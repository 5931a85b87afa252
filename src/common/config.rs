//! Configuration file handling

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::paths::{config_path, screenshot_root};
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Automation server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Event runner settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Driver client settings
    #[serde(default)]
    pub driver: DriverConfig,

    /// Screenshot diff settings
    #[serde(default)]
    pub diff: DiffConfig,

    /// Path overrides
    #[serde(default)]
    pub paths: PathsConfig,
}

/// How to launch the shared automation server
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server executable (name on PATH or absolute path)
    #[serde(default = "default_server_program")]
    pub program: PathBuf,

    /// Arguments appended after `-a <host> -p <port>`
    #[serde(default = "default_server_args")]
    pub args: Vec<String>,

    /// Line fragment printed by the server once it accepts sessions
    #[serde(default = "default_ready_banner")]
    pub ready_banner: String,

    /// How long to wait for the banner before continuing anyway
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            program: default_server_program(),
            args: default_server_args(),
            ready_banner: default_ready_banner(),
            ready_timeout_secs: default_ready_timeout(),
        }
    }
}

fn default_server_program() -> PathBuf {
    PathBuf::from("appium")
}
fn default_server_args() -> Vec<String> {
    vec!["--allow-cors".to_string()]
}
fn default_ready_banner() -> String {
    "Appium REST http interface listener started".to_string()
}
fn default_ready_timeout() -> u64 {
    3
}

impl ServerConfig {
    /// Resolve the server program, searching PATH when it is not a path on disk
    pub fn resolve_program(&self) -> PathBuf {
        if self.program.exists() {
            return self.program.clone();
        }
        which::which(&self.program).unwrap_or_else(|_| self.program.clone())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

/// Event runner settings
#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    /// Wait after opening a session for the app to become interactive
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    /// Cut the device status bar off the top of each screenshot
    #[serde(default = "default_true")]
    pub crop_status_bar: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay(),
            crop_status_bar: default_true(),
        }
    }
}

fn default_settle_delay() -> u64 {
    3
}
fn default_true() -> bool {
    true
}

/// Driver client settings
#[derive(Debug, Deserialize, Clone)]
pub struct DriverConfig {
    /// Timeout for a single WebDriver HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    120
}

/// Screenshot diff settings
#[derive(Debug, Deserialize, Clone)]
pub struct DiffConfig {
    /// Fraction of pixels allowed to differ before two images count as different
    #[serde(default = "default_tolerance_rate")]
    pub tolerance_rate: f64,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            tolerance_rate: default_tolerance_rate(),
        }
    }
}

fn default_tolerance_rate() -> f64 {
    crate::diff::DEFAULT_TOLERANCE_RATE
}

/// Path overrides
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PathsConfig {
    /// Root directory for screenshot runs
    pub screenshot_root: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return Self::parse(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Root directory for screenshot runs
    pub fn screenshot_root(&self) -> Result<PathBuf> {
        self.paths
            .screenshot_root
            .clone()
            .or_else(screenshot_root)
            .ok_or_else(|| super::Error::Config("Cannot determine screenshot directory".to_string()))
    }
}
