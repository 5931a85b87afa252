//! Scenario construction
//!
//! ```
//! use std::time::Duration;
//! use scenario_runner::scenario::{Scenario, Selector, StepBuilder};
//!
//! let scenario = Scenario::builder()
//!     .step(StepBuilder::tap(Selector::tag("start_button")).screenshot("start_dialog"))
//!     .step(StepBuilder::input_text(Selector::tag("name_field"), "test").wait(Duration::from_millis(250)))
//!     .step(StepBuilder::hide_keyboard())
//!     .build()
//!     .unwrap();
//! assert_eq!(scenario.len(), 3);
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::common::Result;

use super::action::{
    ActionKind, EventAction, QueryOperation, ScreenshotLabel, ScrollDirection, Selector,
};

/// Default wait after every interaction
pub const DEFAULT_POST_WAIT: Duration = Duration::from_secs(1);

const DEFAULT_REPEAT_TAPS: u32 = 10;
const DEFAULT_REPEAT_TAP_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_SCROLL_INTERVAL: Duration = Duration::from_secs(1);

/// Immutable ordered list of actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    actions: Arc<[EventAction]>,
    title: Option<String>,
    description: Option<String>,
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder::default()
    }

    /// Read-only view of the actions in declaration order
    pub fn actions(&self) -> &[EventAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Display name, when the scenario declares one
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Accumulates steps in call order
#[derive(Debug, Default)]
pub struct ScenarioBuilder {
    steps: Vec<StepBuilder>,
    title: Option<String>,
    description: Option<String>,
}

impl ScenarioBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn step(mut self, step: StepBuilder) -> Self {
        self.steps.push(step);
        self
    }

    pub fn push(&mut self, step: StepBuilder) {
        self.steps.push(step);
    }

    /// Validate every step and freeze the scenario
    pub fn build(self) -> Result<Scenario> {
        let actions = self
            .steps
            .into_iter()
            .map(StepBuilder::build)
            .collect::<Result<Vec<_>>>()?;
        Ok(Scenario {
            actions: actions.into(),
            title: self.title,
            description: self.description,
        })
    }
}

/// Builder for a single action with its optional settings
#[derive(Debug, Clone)]
pub struct StepBuilder {
    kind: ActionKind,
    post_wait: Duration,
    screenshot: Option<String>,
}

impl StepBuilder {
    fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            post_wait: DEFAULT_POST_WAIT,
            screenshot: None,
        }
    }

    pub fn tap(selector: Selector) -> Self {
        Self::new(ActionKind::Tap { selector })
    }

    pub fn tap_child(parent: Selector, child_index: u32) -> Self {
        Self::new(ActionKind::TapChild {
            parent,
            child_index,
            sub_selector: None,
        })
    }

    pub fn input_text(selector: Selector, text: impl Into<String>) -> Self {
        Self::new(ActionKind::InputText {
            selector,
            text: text.into(),
        })
    }

    /// Scroll a container once; `None` scrolls the single ScrollView on screen
    pub fn scroll(selector: Option<Selector>) -> Self {
        Self::new(ActionKind::Scroll {
            selector,
            direction: ScrollDirection::default(),
            repeat: 1,
            interval: DEFAULT_SCROLL_INTERVAL,
        })
    }

    pub fn hide_keyboard() -> Self {
        Self::new(ActionKind::HideKeyboard)
    }

    pub fn long_tap(selector: Selector) -> Self {
        Self::new(ActionKind::LongTap { selector })
    }

    pub fn repeat_tap(selector: Selector) -> Self {
        Self::new(ActionKind::RepeatTap {
            selector,
            repeat: DEFAULT_REPEAT_TAPS,
            interval: DEFAULT_REPEAT_TAP_INTERVAL,
        })
    }

    /// Press an Android key code (e.g. 4 for BACK)
    pub fn key_press(key_code: u32) -> Self {
        Self::new(ActionKind::KeyPress { key_code })
    }

    pub fn query_tap(query: impl Into<String>) -> Self {
        Self::new(ActionKind::RawQuery {
            query: query.into(),
            operation: QueryOperation::Tap,
        })
    }

    pub fn query_input(query: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(ActionKind::RawQuery {
            query: query.into(),
            operation: QueryOperation::InputText(text.into()),
        })
    }

    /// Wait after the interaction, before the screenshot
    pub fn wait(mut self, post_wait: Duration) -> Self {
        self.post_wait = post_wait;
        self
    }

    /// Name the screenshot taken after this step
    pub fn screenshot(mut self, label: impl Into<String>) -> Self {
        self.screenshot = Some(label.into());
        self
    }

    /// Repeat count for scroll and repeat-tap steps; ignored elsewhere
    pub fn repeat(mut self, count: u32) -> Self {
        match &mut self.kind {
            ActionKind::Scroll { repeat, .. } | ActionKind::RepeatTap { repeat, .. } => {
                *repeat = count
            }
            _ => {}
        }
        self
    }

    /// Interval between repetitions for scroll and repeat-tap steps; ignored elsewhere
    pub fn interval(mut self, every: Duration) -> Self {
        match &mut self.kind {
            ActionKind::Scroll { interval, .. } | ActionKind::RepeatTap { interval, .. } => {
                *interval = every
            }
            _ => {}
        }
        self
    }

    /// Scroll direction; ignored for other steps
    pub fn direction(mut self, scroll_direction: ScrollDirection) -> Self {
        if let ActionKind::Scroll { direction, .. } = &mut self.kind {
            *direction = scroll_direction;
        }
        self
    }

    /// Tap a descendant of the child instead of the child itself; ignored for other steps
    pub fn sub_selector(mut self, selector: Selector) -> Self {
        if let ActionKind::TapChild { sub_selector, .. } = &mut self.kind {
            *sub_selector = Some(selector);
        }
        self
    }

    pub fn build(self) -> Result<EventAction> {
        let screenshot_label = self.screenshot.map(ScreenshotLabel::new).transpose()?;
        Ok(EventAction {
            post_wait: self.post_wait,
            screenshot_label,
            kind: self.kind,
        })
    }
}
