//! WebDriver client for an Appium server
//!
//! Talks W3C WebDriver plus the Appium extension endpoints over HTTP.
//! Elements are located with either the `id` strategy or a raw
//! `-android uiautomator` query.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;

use crate::common::{Error, Result};
use crate::scenario::Selector;
use crate::target::AutomationConfig;

use super::types::{element_id, FindElementRequest, NewSessionValue, WireError, WireResponse};
use super::{DeviceDriver, ElementHandle, SessionId};

/// WebDriver error code for a failed element lookup
const NO_SUCH_ELEMENT: &str = "no such element";

/// Driver session over HTTP
pub struct AppiumDriver {
    http: reqwest::Client,
    base_url: Option<String>,
    session: Option<SessionId>,
}

impl AppiumDriver {
    pub fn new(request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: None,
            session: None,
        }
    }

    fn session_url(&self, path: &str) -> Result<String> {
        match (&self.base_url, &self.session) {
            (Some(base), Some(session)) => Ok(format!("{}/session/{}{}", base, session, path)),
            _ => Err(Error::SessionNotStarted),
        }
    }

    /// Send a request and unwrap the `value` payload
    async fn request(&self, command: &str, method: Method, url: String, body: Option<Value>) -> Result<Value> {
        tracing::debug!(command, %method, %url, "WebDriver request");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        tracing::trace!(command, %status, body = %text, "WebDriver response");

        let parsed: WireResponse = serde_json::from_str(&text).map_err(|e| {
            Error::DriverProtocol(format!("Invalid {} response ({}): {}", command, status, e))
        })?;

        if status.is_success() {
            return Ok(parsed.value);
        }

        match serde_json::from_value::<WireError>(parsed.value) {
            Ok(err) if err.error == NO_SUCH_ELEMENT => Err(Error::DriverRequestFailed {
                command: command.to_string(),
                message: NO_SUCH_ELEMENT.to_string(),
            }),
            Ok(err) => Err(Error::driver_request_failed(
                command,
                &format!("{}: {}", err.error, err.message),
            )),
            Err(_) => Err(Error::driver_request_failed(command, &format!("HTTP {}", status))),
        }
    }

    async fn session_request(&self, command: &str, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self.session_url(path)?;
        self.request(command, method, url, body).await
    }

    async fn locate(&self, path: &str, selector: &Selector) -> Result<ElementHandle> {
        let (using, value) = match selector {
            Selector::Id(id) => ("id", id.as_str()),
            Selector::Query(query) => ("-android uiautomator", query.as_str()),
        };
        let body = serde_json::to_value(FindElementRequest { using, value })?;

        let value = match self.session_request("findElement", Method::POST, path, Some(body)).await {
            Ok(value) => value,
            Err(Error::DriverRequestFailed { message, .. }) if message == NO_SUCH_ELEMENT => {
                return Err(Error::element_not_found(selector));
            }
            Err(e) => return Err(e),
        };

        element_id(&value)
            .map(ElementHandle)
            .ok_or_else(|| Error::DriverProtocol(format!("findElement returned no element reference: {}", value)))
    }
}

#[async_trait]
impl DeviceDriver for AppiumDriver {
    async fn open(&mut self, config: &AutomationConfig) -> Result<SessionId> {
        if self.session.is_some() {
            return Err(Error::SessionAlreadyStarted);
        }

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "platformName": "Android",
                    "appium:automationName": "UiAutomator2",
                    "appium:udid": config.udid,
                    "appium:app": config.app,
                    "appium:fullReset": true,
                    "appium:autoGrantPermissions": true,
                }
            }
        });

        let base_url = config.base_url();
        let value = self
            .request("newSession", Method::POST, format!("{}/session", base_url), Some(capabilities))
            .await?;
        let created: NewSessionValue = serde_json::from_value(value)
            .map_err(|e| Error::DriverProtocol(format!("Invalid newSession response: {}", e)))?;

        tracing::info!(session = %created.session_id, udid = %config.udid, "Driver session opened");

        let session = SessionId(created.session_id);
        self.base_url = Some(base_url);
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn find_element(&mut self, selector: &Selector) -> Result<ElementHandle> {
        self.locate("/element", selector).await
    }

    async fn find_child(&mut self, parent: &ElementHandle, selector: &Selector) -> Result<ElementHandle> {
        self.locate(&format!("/element/{}/element", parent), selector).await
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        self.session_request("click", Method::POST, &format!("/element/{}/click", element), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn long_click(&mut self, element: &ElementHandle) -> Result<()> {
        let body = json!({
            "script": "mobile: longClickGesture",
            "args": [{ "elementId": element.0 }],
        });
        self.session_request("longClick", Method::POST, "/execute/sync", Some(body))
            .await?;
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        self.session_request(
            "sendKeys",
            Method::POST,
            &format!("/element/{}/value", element),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn press_key(&mut self, key_code: u32) -> Result<()> {
        self.session_request(
            "pressKeyCode",
            Method::POST,
            "/appium/device/press_keycode",
            Some(json!({ "keycode": key_code })),
        )
        .await?;
        Ok(())
    }

    async fn hide_keyboard(&mut self) -> Result<()> {
        self.session_request("hideKeyboard", Method::POST, "/appium/device/hide_keyboard", Some(json!({})))
            .await?;
        Ok(())
    }

    async fn take_screenshot(&mut self) -> Result<Vec<u8>> {
        let value = self
            .session_request("screenshot", Method::GET, "/screenshot", None)
            .await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| Error::DriverProtocol("screenshot value is not a string".to_string()))?;
        // Some servers wrap the payload in line breaks
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| Error::DriverProtocol(format!("Invalid screenshot encoding: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let Some(base_url) = self.base_url.take() else {
            return Ok(());
        };

        self.request(
            "deleteSession",
            Method::DELETE,
            format!("{}/session/{}", base_url, session),
            None,
        )
        .await?;
        tracing::info!(session = %session, "Driver session closed");
        Ok(())
    }
}
