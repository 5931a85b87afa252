//! Driver handles and WebDriver wire types
//!
//! See: https://www.w3.org/TR/webdriver2/ and the Appium UiAutomator2 driver docs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Key under which W3C WebDriver returns element references
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Identifier of an open driver session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an element found in the current UI tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// === Wire Messages ===

/// Every WebDriver response wraps its payload in `value`
#[derive(Debug, Clone, Deserialize)]
pub struct WireResponse {
    #[serde(default)]
    pub value: Value,
}

/// Error payload carried in `value` on failure
#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Result of `POST /session`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionValue {
    pub session_id: String,
    #[serde(default)]
    pub capabilities: Value,
}

/// `POST /element` body
#[derive(Debug, Clone, Serialize)]
pub struct FindElementRequest<'a> {
    pub using: &'a str,
    pub value: &'a str,
}

/// Extract the element id from a find-element `value`
pub fn element_id(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
