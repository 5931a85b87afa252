//! Automation targets
//!
//! A target names a device, the scenario to run on it and the driver
//! settings. Targets are replaced whole, never edited in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::common::paths;
use crate::scenario::SAMPLE_SCENARIO_NAME;

/// Unique identifier of a target; the next id is the current maximum plus one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub u64);

impl TargetId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device geometry used when post-processing screenshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_name: String,
    pub status_bar_height: u32,
    pub navigation_bar_height: u32,
}

impl DeviceInfo {
    pub fn new(device_name: impl Into<String>, status_bar_height: u32, navigation_bar_height: u32) -> Self {
        Self {
            device_name: device_name.into(),
            status_bar_height,
            navigation_bar_height,
        }
    }

    /// Built-in device presets (button and gesture navigation variants)
    pub fn presets() -> Vec<DeviceInfo> {
        vec![
            Self::new("Pixel 8 Pro", 72, 144),
            Self::new("Pixel 8 Pro (gesture navigation)", 72, 48),
            Self::new("Pixel Tablet", 48, 96),
            Self::new("Pixel Tablet (gesture navigation)", 48, 64),
        ]
    }

    /// Look a preset up by case-insensitive name
    pub fn preset(name: &str) -> Option<DeviceInfo> {
        Self::presets()
            .into_iter()
            .find(|d| d.device_name.eq_ignore_ascii_case(name))
    }
}

/// Where the driver session connects and what it installs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationConfig {
    pub host: String,
    pub port: u16,
    pub udid: String,
    /// Path to the application package
    pub app: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        let app = paths::home_dir()
            .map(|home| home.join("app-debug.apk").display().to_string())
            .unwrap_or_else(|| "app-debug.apk".to_string());
        Self {
            host: "127.0.0.1".to_string(),
            port: 4723,
            udid: "emulator-5554".to_string(),
            app,
        }
    }
}

impl AutomationConfig {
    /// File name of the application package, used to key screenshot runs
    pub fn app_identifier(&self) -> String {
        Path::new(&self.app)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.app.clone())
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// A named automation job configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub device_info: DeviceInfo,
    pub scenario_name: String,
    pub configuration: AutomationConfig,
}

impl Target {
    /// The target used when no target list exists yet
    pub fn sample() -> Self {
        let device_info = DeviceInfo::new("Pixel 8 Pro", 72, 144);
        Self {
            id: TargetId(0),
            name: format!("Sample ({})", device_info.device_name),
            device_info,
            scenario_name: SAMPLE_SCENARIO_NAME.to_string(),
            configuration: AutomationConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_json_shape() {
        let target = Target {
            id: TargetId(3),
            name: "phone".to_string(),
            device_info: DeviceInfo::new("Pixel 8 Pro", 72, 144),
            scenario_name: "smoke".to_string(),
            configuration: AutomationConfig {
                host: "127.0.0.1".to_string(),
                port: 4723,
                udid: "emulator-5554".to_string(),
                app: "/tmp/app-debug.apk".to_string(),
            },
        };

        let value = serde_json::to_value(&target).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["deviceInfo"]["statusBarHeight"], 72);
        assert_eq!(value["deviceInfo"]["navigationBarHeight"], 144);
        assert_eq!(value["scenarioName"], "smoke");
        assert_eq!(value["configuration"]["app"], "/tmp/app-debug.apk");

        let back: Target = serde_json::from_value(value).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn test_app_identifier_is_file_name() {
        let config = AutomationConfig {
            app: "/home/me/builds/app-debug.apk".to_string(),
            ..AutomationConfig::default()
        };
        assert_eq!(config.app_identifier(), "app-debug.apk");
        assert_eq!(config.base_url(), "http://127.0.0.1:4723");
    }

    #[test]
    fn test_presets() {
        let tablet = DeviceInfo::preset("pixel tablet").unwrap();
        assert_eq!(tablet.status_bar_height, 48);
        assert_eq!(tablet.navigation_bar_height, 96);
        assert!(DeviceInfo::preset("unknown").is_none());
    }
}
