//! Device automation driver seam
//!
//! The runner only talks to a device through [`DeviceDriver`]. The real
//! implementation speaks WebDriver to an Appium server; [`MockDriver`] records
//! calls and serves generated screenshots for dry runs and tests.

pub mod appium;
pub mod mock;
pub mod types;

use async_trait::async_trait;
use std::time::Duration;

use crate::common::Result;
use crate::scenario::Selector;
use crate::target::{AutomationConfig, Target};

pub use appium::AppiumDriver;
pub use mock::{DriverCall, MockDriver};
pub use types::{ElementHandle, SessionId};

/// Primitive UI operations against one device session
#[async_trait]
pub trait DeviceDriver: Send {
    /// Open a session; every other call requires an open session
    async fn open(&mut self, config: &AutomationConfig) -> Result<SessionId>;

    /// Find an element; fails with `ElementNotFound` when nothing matches
    async fn find_element(&mut self, selector: &Selector) -> Result<ElementHandle>;

    /// Find an element below `parent`
    async fn find_child(&mut self, parent: &ElementHandle, selector: &Selector) -> Result<ElementHandle>;

    async fn click(&mut self, element: &ElementHandle) -> Result<()>;

    async fn long_click(&mut self, element: &ElementHandle) -> Result<()>;

    async fn send_keys(&mut self, element: &ElementHandle, text: &str) -> Result<()>;

    /// Press an Android key code
    async fn press_key(&mut self, key_code: u32) -> Result<()>;

    async fn hide_keyboard(&mut self) -> Result<()>;

    /// Capture the screen as encoded image bytes (PNG)
    async fn take_screenshot(&mut self) -> Result<Vec<u8>>;

    /// End the session
    async fn close(&mut self) -> Result<()>;
}

/// Creates a fresh driver for each run
pub trait DriverFactory: Send + Sync {
    fn create(&self, target: &Target) -> Box<dyn DeviceDriver>;
}

/// Builds [`AppiumDriver`]s with a shared request timeout
#[derive(Debug, Clone)]
pub struct AppiumDriverFactory {
    request_timeout: Duration,
}

impl AppiumDriverFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl DriverFactory for AppiumDriverFactory {
    fn create(&self, _target: &Target) -> Box<dyn DeviceDriver> {
        Box::new(AppiumDriver::new(self.request_timeout))
    }
}
