//! In-process driver for dry runs and tests
//!
//! Every call is appended to a shared log. Lookups succeed unless the
//! selector was marked missing, and screenshots are solid-colour PNGs.

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::common::{Error, Result};
use crate::scenario::Selector;
use crate::target::{AutomationConfig, Target};

use super::{DeviceDriver, DriverFactory, ElementHandle, SessionId};

/// A call received by [`MockDriver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Open { udid: String },
    FindElement(Selector),
    FindChild { parent: ElementHandle, selector: Selector },
    Click(ElementHandle),
    LongClick(ElementHandle),
    SendKeys { element: ElementHandle, text: String },
    PressKey(u32),
    HideKeyboard,
    TakeScreenshot,
    Close,
}

#[derive(Debug, Default)]
struct Shared {
    calls: Vec<DriverCall>,
    missing: HashSet<Selector>,
    next_element: u64,
    sessions_opened: u64,
}

/// Recording driver; clones share the call log but not the session
#[derive(Debug, Clone)]
pub struct MockDriver {
    shared: Arc<Mutex<Shared>>,
    session: Option<SessionId>,
    screen: (u32, u32),
    color: [u8; 3],
    latency: Duration,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            session: None,
            screen: (108, 240),
            color: [255, 255, 255],
            latency: Duration::ZERO,
        }
    }

    /// Size of generated screenshots
    pub fn with_screen_size(mut self, width: u32, height: u32) -> Self {
        self.screen = (width, height);
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    /// Delay applied to every call, to emulate a slow device
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make lookups of `selector` fail with `ElementNotFound`
    pub fn fail_on(self, selector: Selector) -> Self {
        self.lock().missing.insert(selector);
        self
    }

    /// Calls recorded so far, across all clones
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        // A poisoned log is still a usable log
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn record(&self, call: DriverCall) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut shared = self.lock();
        shared.calls.push(call);
        if self.session.is_none() && !matches!(shared.calls.last(), Some(DriverCall::Open { .. } | DriverCall::Close)) {
            return Err(Error::SessionNotStarted);
        }
        Ok(())
    }

    fn resolve(&self, selector: &Selector) -> Result<ElementHandle> {
        let mut shared = self.lock();
        if shared.missing.contains(selector) {
            return Err(Error::element_not_found(selector));
        }
        shared.next_element += 1;
        Ok(ElementHandle(format!("element-{}", shared.next_element)))
    }

    fn render_screenshot(&self) -> Result<Vec<u8>> {
        let (width, height) = self.screen;
        let image = RgbImage::from_pixel(width, height, Rgb(self.color));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
        Ok(bytes)
    }
}

#[async_trait]
impl DeviceDriver for MockDriver {
    async fn open(&mut self, config: &AutomationConfig) -> Result<SessionId> {
        if self.session.is_some() {
            return Err(Error::SessionAlreadyStarted);
        }
        self.record(DriverCall::Open {
            udid: config.udid.clone(),
        })
        .await?;

        let session = {
            let mut shared = self.lock();
            shared.sessions_opened += 1;
            SessionId(format!("mock-session-{}", shared.sessions_opened))
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn find_element(&mut self, selector: &Selector) -> Result<ElementHandle> {
        self.record(DriverCall::FindElement(selector.clone())).await?;
        self.resolve(selector)
    }

    async fn find_child(&mut self, parent: &ElementHandle, selector: &Selector) -> Result<ElementHandle> {
        self.record(DriverCall::FindChild {
            parent: parent.clone(),
            selector: selector.clone(),
        })
        .await?;
        self.resolve(selector)
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        self.record(DriverCall::Click(element.clone())).await
    }

    async fn long_click(&mut self, element: &ElementHandle) -> Result<()> {
        self.record(DriverCall::LongClick(element.clone())).await
    }

    async fn send_keys(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        self.record(DriverCall::SendKeys {
            element: element.clone(),
            text: text.to_string(),
        })
        .await
    }

    async fn press_key(&mut self, key_code: u32) -> Result<()> {
        self.record(DriverCall::PressKey(key_code)).await
    }

    async fn hide_keyboard(&mut self) -> Result<()> {
        self.record(DriverCall::HideKeyboard).await
    }

    async fn take_screenshot(&mut self) -> Result<Vec<u8>> {
        self.record(DriverCall::TakeScreenshot).await?;
        self.render_screenshot()
    }

    async fn close(&mut self) -> Result<()> {
        if self.session.take().is_some() {
            self.record(DriverCall::Close).await?;
        }
        Ok(())
    }
}

impl DriverFactory for MockDriver {
    fn create(&self, _target: &Target) -> Box<dyn DeviceDriver> {
        let mut driver = self.clone();
        driver.session = None;
        Box::new(driver)
    }
}
