//! Error types for the scenario runner
//!
//! Every failure inside a run is converted to text at the job boundary, so
//! messages are written to be readable on their own in a status listing.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scenario runner
#[derive(Error, Debug)]
pub enum Error {
    // === Session Errors ===
    #[error("No device session open. Call start() before executing steps")]
    SessionNotStarted,

    #[error("Device session already started for this runner")]
    SessionAlreadyStarted,

    #[error("Run cancelled")]
    Cancelled,

    // === Driver Errors ===
    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Driver request '{command}' failed: {message}")]
    DriverRequestFailed { command: String, message: String },

    #[error("Driver protocol error: {0}")]
    DriverProtocol(String),

    // === Automation Server Errors ===
    #[error("Automation server failed to start: {0}")]
    ServerLaunch(String),

    // === Scenario / Target Errors ===
    #[error("Invalid screenshot label '{0}': must not contain any of \\ / : * ? \" < > |")]
    InvalidScreenshotLabel(String),

    #[error("Scenario '{0}' not found (no built-in scenario or scenario file with that name)")]
    ScenarioNotFound(String),

    #[error("Target {0} not found")]
    TargetNotFound(u64),

    #[error("{0} run(s) did not complete")]
    RunsIncomplete(usize),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an element not found error for a selector
    pub fn element_not_found(selector: impl std::fmt::Display) -> Self {
        Self::ElementNotFound {
            selector: selector.to_string(),
        }
    }

    /// Create a driver request failed error
    pub fn driver_request_failed(command: &str, message: &str) -> Self {
        Self::DriverRequestFailed {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    /// Operation invoked in the wrong session state
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::SessionNotStarted | Self::SessionAlreadyStarted)
    }

    /// Cooperative cancellation unwinding, not a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Render the error together with its source chain
    pub fn diagnostic(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let cause_text = cause.to_string();
            // `#[from]` variants already embed the source message
            if !text.contains(&cause_text) {
                text.push_str("\n  caused by: ");
                text.push_str(&cause_text);
            }
            source = cause.source();
        }
        text
    }
}
