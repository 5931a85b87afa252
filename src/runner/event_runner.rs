//! Scenario execution against one device session
//!
//! Lifecycle: `NotStarted -> Started -> Closed`. Every step resolves its
//! selectors, performs the interaction, waits, then saves a screenshot.
//! Cancellation is observed before the session opens, before each selector
//! lookup and during every wait; calls already sent to the driver finish.

use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::driver::{DeviceDriver, ElementHandle, SessionId};
use crate::scenario::{ActionKind, EventAction, QueryOperation, Scenario, ScreenshotLabel, Selector};
use crate::store::run_dir;
use crate::target::Target;

use super::screenshot::{auto_name, save_screenshot};

/// Runner lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    NotStarted,
    Started(SessionId),
    Closed,
}

/// Settings shared by every runner
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Wait after opening a session for the app to become interactive
    pub settle_delay: Duration,
    /// Crop the target's status bar off screenshots
    pub crop_status_bar: bool,
    /// Root of the screenshot directory tree
    pub screenshot_root: PathBuf,
}

impl RunnerSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            settle_delay: Duration::from_secs(config.runner.settle_delay_secs),
            crop_status_bar: config.runner.crop_status_bar,
            screenshot_root: config.screenshot_root()?,
        })
    }
}

/// Executes one scenario on one device
pub struct EventRunner {
    driver: Box<dyn DeviceDriver>,
    target: Target,
    settings: RunnerSettings,
    cancel: CancellationToken,
    state: RunnerState,
    output_dir: Option<PathBuf>,
    /// Next auto-generated screenshot number
    auto_index: u32,
}

impl EventRunner {
    pub fn new(
        driver: Box<dyn DeviceDriver>,
        target: Target,
        settings: RunnerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            driver,
            target,
            settings,
            cancel,
            state: RunnerState::NotStarted,
            output_dir: None,
            auto_index: 0,
        }
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    /// Directory receiving this run's screenshots, once started
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Open the driver session, wait for the app, and take the launch screenshot
    pub async fn start(&mut self) -> Result<SessionId> {
        if self.state != RunnerState::NotStarted {
            return Err(Error::SessionAlreadyStarted);
        }
        self.check_cancelled()?;

        let session = self.driver.open(&self.target.configuration).await?;
        self.state = RunnerState::Started(session.clone());
        tracing::info!(target_name = %self.target.name, session = %session, "Session started");

        pause(&self.cancel, self.settings.settle_delay).await?;

        let dir = run_dir(
            &self.settings.screenshot_root,
            &self.target.name,
            Local::now(),
            &self.target.configuration.app_identifier(),
        );
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "Screenshot directory created");
        self.output_dir = Some(dir);

        self.capture(None).await?;
        Ok(session)
    }

    /// Perform one action, wait its post-wait, and save its screenshot
    pub async fn execute_step(&mut self, action: &EventAction) -> Result<PathBuf> {
        if !matches!(self.state, RunnerState::Started(_)) || self.output_dir.is_none() {
            return Err(Error::SessionNotStarted);
        }

        tracing::debug!(action = %action.name(), element = %action.target(), "Executing step");
        self.perform(action.kind()).await?;
        pause(&self.cancel, action.post_wait()).await?;
        self.capture(action.screenshot_label()).await
    }

    /// Run every action in order, reporting each index before it executes
    pub async fn run_scenario(&mut self, scenario: &Scenario, progress: &mpsc::UnboundedSender<usize>) -> Result<()> {
        for (index, action) in scenario.actions().iter().enumerate() {
            self.check_cancelled()?;
            let _ = progress.send(index);
            tracing::info!(target_name = %self.target.name, step = index, action = %action.name(), "Step");
            self.execute_step(action).await?;
        }
        Ok(())
    }

    /// Start, run the whole scenario and close, closing even after a failure
    pub async fn run(&mut self, scenario: &Scenario, progress: &mpsc::UnboundedSender<usize>) -> Result<()> {
        let result = match self.start().await {
            Ok(_) => self.run_scenario(scenario, progress).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.close().await {
            tracing::warn!(target_name = %self.target.name, error = %e, "Failed to close driver session");
        }
        result
    }

    /// Release the driver session; safe to call repeatedly
    pub async fn close(&mut self) -> Result<()> {
        let previous = std::mem::replace(&mut self.state, RunnerState::Closed);
        if let RunnerState::Started(session) = previous {
            tracing::info!(target_name = %self.target.name, session = %session, "Closing session");
            self.driver.close().await?;
        }
        Ok(())
    }

    async fn find(&mut self, selector: &Selector) -> Result<ElementHandle> {
        self.check_cancelled()?;
        self.driver.find_element(selector).await
    }

    async fn perform(&mut self, kind: &ActionKind) -> Result<()> {
        match kind {
            ActionKind::Tap { selector } => {
                let element = self.find(selector).await?;
                self.driver.click(&element).await
            }
            ActionKind::TapChild {
                parent,
                child_index,
                sub_selector,
            } => {
                let parent = self.find(parent).await?;
                self.check_cancelled()?;
                let child_selector = ActionKind::child_selector(*child_index, sub_selector.as_ref());
                let child = self.driver.find_child(&parent, &child_selector).await?;
                self.driver.click(&child).await
            }
            ActionKind::InputText { selector, text } => {
                let element = self.find(selector).await?;
                self.driver.send_keys(&element, text).await
            }
            ActionKind::Scroll {
                selector,
                direction,
                repeat,
                interval,
            } => {
                // Resolving a UiScrollable query performs the scroll
                let scroll = ActionKind::scroll_selector(selector.as_ref(), *direction);
                for _ in 0..*repeat {
                    self.find(&scroll).await?;
                    pause(&self.cancel, *interval).await?;
                }
                Ok(())
            }
            ActionKind::HideKeyboard => self.driver.hide_keyboard().await,
            ActionKind::LongTap { selector } => {
                let element = self.find(selector).await?;
                self.driver.long_click(&element).await
            }
            ActionKind::RepeatTap {
                selector,
                repeat,
                interval,
            } => {
                if *repeat == 0 {
                    return Ok(());
                }
                let element = self.find(selector).await?;
                for _ in 0..*repeat {
                    self.driver.click(&element).await?;
                    pause(&self.cancel, *interval).await?;
                }
                Ok(())
            }
            ActionKind::KeyPress { key_code } => self.driver.press_key(*key_code).await,
            ActionKind::RawQuery { query, operation } => {
                let element = self.find(&Selector::query(query.as_str())).await?;
                match operation {
                    QueryOperation::Tap => self.driver.click(&element).await,
                    QueryOperation::InputText(text) => self.driver.send_keys(&element, text).await,
                }
            }
        }
    }

    async fn capture(&mut self, label: Option<&ScreenshotLabel>) -> Result<PathBuf> {
        let dir = self.output_dir.clone().ok_or(Error::SessionNotStarted)?;
        let name = match label {
            Some(label) => label.to_string(),
            None => {
                let name = auto_name(self.auto_index);
                self.auto_index += 1;
                name
            }
        };
        let path = dir.join(format!("{}.png", name));

        let bytes = self.driver.take_screenshot().await?;
        let crop = self
            .settings
            .crop_status_bar
            .then_some(self.target.device_info.status_bar_height);

        let save_path = path.clone();
        tokio::task::spawn_blocking(move || save_screenshot(&bytes, crop, &save_path))
            .await
            .map_err(|e| Error::Internal(format!("Screenshot task failed: {}", e)))??;

        tracing::debug!(file = %path.display(), "Screenshot saved");
        Ok(path)
    }
}

/// Sleep unless cancelled first
async fn pause(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
