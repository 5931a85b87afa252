//! Event action types
//!
//! An [`EventAction`] is one UI interaction plus the wait that follows it and
//! the name of the screenshot taken afterwards. Actions are only created through
//! [`crate::scenario::StepBuilder`], which validates screenshot labels.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::common::{Error, Result};

/// Scrollable used when a scroll step names no container
pub const DEFAULT_SCROLLABLE: &str = "new UiSelector().className(\"android.widget.ScrollView\")";

/// How to locate an element in the UI tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Resource id lookup (the driver's `id` strategy)
    Id(String),
    /// Free-text UiAutomator query
    Query(String),
}

impl Selector {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn query(query: impl Into<String>) -> Self {
        Self::Query(query.into())
    }

    /// Compose test tag exposed as a resource id
    pub fn tag(tag: &str) -> Self {
        Self::Query(format!("new UiSelector().resourceId(\"{}\")", tag))
    }

    /// Element showing exactly this text
    pub fn text(text: &str) -> Self {
        Self::Query(format!("new UiSelector().text(\"{}\")", text))
    }

    /// The selector as a UiSelector expression, for embedding in composite queries
    pub fn as_ui_selector(&self) -> String {
        match self {
            Self::Id(id) => format!("new UiSelector().resourceId(\"{}\")", id),
            Self::Query(query) => query.clone(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={}", id),
            Self::Query(query) => write!(f, "query={}", query),
        }
    }
}

/// Direction of a scroll step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
    #[default]
    VerticalForward,
    VerticalBackward,
    HorizontalForward,
    HorizontalBackward,
}

impl ScrollDirection {
    /// UiScrollable method chain performing the scroll
    fn method(&self) -> &'static str {
        match self {
            Self::VerticalForward => ".scrollForward()",
            Self::VerticalBackward => ".scrollBackward()",
            Self::HorizontalForward => ".setAsHorizontalList().scrollForward()",
            Self::HorizontalBackward => ".setAsHorizontalList().scrollBackward()",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::VerticalForward => "scroll down",
            Self::VerticalBackward => "scroll up",
            Self::HorizontalForward => "scroll right",
            Self::HorizontalBackward => "scroll left",
        }
    }
}

/// What a raw query step does with the element it finds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOperation {
    Tap,
    InputText(String),
}

/// Variant-specific payload of an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Tap {
        selector: Selector,
    },
    TapChild {
        parent: Selector,
        child_index: u32,
        /// Tap this descendant of the child instead of the child itself
        sub_selector: Option<Selector>,
    },
    InputText {
        selector: Selector,
        text: String,
    },
    Scroll {
        /// Scrollable container; `None` means the single ScrollView on screen
        selector: Option<Selector>,
        direction: ScrollDirection,
        repeat: u32,
        interval: Duration,
    },
    HideKeyboard,
    LongTap {
        selector: Selector,
    },
    RepeatTap {
        selector: Selector,
        repeat: u32,
        interval: Duration,
    },
    KeyPress {
        key_code: u32,
    },
    RawQuery {
        query: String,
        operation: QueryOperation,
    },
}

impl ActionKind {
    /// Query locating the child of a TapChild step within its parent
    pub fn child_selector(child_index: u32, sub_selector: Option<&Selector>) -> Selector {
        match sub_selector {
            None => Selector::Query(format!("new UiSelector().index({})", child_index)),
            Some(sub) => Selector::Query(format!(
                "new UiSelector().index({}).childSelector({})",
                child_index,
                sub.as_ui_selector()
            )),
        }
    }

    /// Query that scrolls the container when resolved
    pub fn scroll_selector(selector: Option<&Selector>, direction: ScrollDirection) -> Selector {
        let scrollable = selector
            .map(Selector::as_ui_selector)
            .unwrap_or_else(|| DEFAULT_SCROLLABLE.to_string());
        Selector::Query(format!(
            "new UiScrollable({}){}",
            scrollable,
            direction.method()
        ))
    }
}

/// Screenshot file stem chosen by the scenario author
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotLabel(String);

fn reserved_chars() -> &'static Regex {
    static RESERVED: OnceLock<Regex> = OnceLock::new();
    RESERVED.get_or_init(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("static regex"))
}

impl ScreenshotLabel {
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if reserved_chars().is_match(&label) {
            return Err(Error::InvalidScreenshotLabel(label));
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenshotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One scenario step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAction {
    pub(crate) post_wait: Duration,
    pub(crate) screenshot_label: Option<ScreenshotLabel>,
    pub(crate) kind: ActionKind,
}

impl EventAction {
    /// Wait between the interaction and its screenshot
    pub fn post_wait(&self) -> Duration {
        self.post_wait
    }

    pub fn screenshot_label(&self) -> Option<&ScreenshotLabel> {
        self.screenshot_label.as_ref()
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// Short human-readable name of the interaction
    pub fn name(&self) -> String {
        match &self.kind {
            ActionKind::Tap { .. } => "tap".to_string(),
            ActionKind::TapChild { .. } => "tap child".to_string(),
            ActionKind::InputText { text, .. } => format!("input text [{}]", text),
            ActionKind::Scroll {
                direction,
                repeat,
                interval,
                ..
            } => {
                if *repeat > 1 {
                    format!("{} x{} every {:?}", direction.label(), repeat, interval)
                } else {
                    direction.label().to_string()
                }
            }
            ActionKind::HideKeyboard => "hide keyboard".to_string(),
            ActionKind::LongTap { .. } => "long tap".to_string(),
            ActionKind::RepeatTap {
                repeat, interval, ..
            } => format!("repeat tap x{} every {:?}", repeat, interval),
            ActionKind::KeyPress { key_code } => format!("key press {}", key_code),
            ActionKind::RawQuery { operation, .. } => match operation {
                QueryOperation::Tap => "tap".to_string(),
                QueryOperation::InputText(text) => format!("input text [{}]", text),
            },
        }
    }

    /// What the interaction is aimed at, empty when it has no element
    pub fn target(&self) -> String {
        match &self.kind {
            ActionKind::Tap { selector }
            | ActionKind::InputText { selector, .. }
            | ActionKind::LongTap { selector }
            | ActionKind::RepeatTap { selector, .. } => selector.to_string(),
            ActionKind::TapChild {
                parent,
                child_index,
                sub_selector,
            } => match sub_selector {
                Some(sub) => format!("{} child #{} / {}", parent, child_index, sub),
                None => format!("{} child #{}", parent, child_index),
            },
            ActionKind::Scroll { selector, .. } => {
                selector.as_ref().map(ToString::to_string).unwrap_or_default()
            }
            ActionKind::RawQuery { query, .. } => query.clone(),
            ActionKind::HideKeyboard | ActionKind::KeyPress { .. } => String::new(),
        }
    }
}
