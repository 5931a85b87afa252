//! Scenario files
//!
//! User scenarios are YAML documents whose steps are tagged by `action`:
//!
//! ```yaml
//! name: login
//! steps:
//!   - action: tap
//!     target: "tag:start_button"
//!     screenshot: start_dialog
//!   - action: input_text
//!     target: "id:user_name"
//!     text: alice
//!     wait_ms: 250
//!   - action: scroll
//!     repeat: 3
//! ```
//!
//! Files go through [`StepBuilder`], so label validation happens while loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::common::{Error, Result};

use super::action::{ScrollDirection, Selector};
use super::{Scenario, StepBuilder};

/// A complete scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct ScenarioFile {
    /// Optional display name (the catalog key is the file stem)
    pub name: Option<String>,
    /// Optional description of what the scenario walks through
    pub description: Option<String>,
    /// Steps in execution order
    pub steps: Vec<StepSpec>,
}

/// One step with its common settings
#[derive(Deserialize, Debug)]
pub struct StepSpec {
    #[serde(flatten)]
    pub action: ActionSpec,
    /// Wait after the interaction in milliseconds (default: 1000)
    pub wait_ms: Option<u64>,
    /// Screenshot name for this step
    pub screenshot: Option<String>,
}

/// The interaction performed by a step
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionSpec {
    Tap {
        target: String,
    },
    TapChild {
        parent: String,
        index: u32,
        sub: Option<String>,
    },
    InputText {
        target: String,
        text: String,
    },
    Scroll {
        target: Option<String>,
        direction: Option<DirectionSpec>,
        repeat: Option<u32>,
        interval_ms: Option<u64>,
    },
    HideKeyboard,
    LongTap {
        target: String,
    },
    RepeatTap {
        target: String,
        repeat: Option<u32>,
        interval_ms: Option<u64>,
    },
    KeyPress {
        key_code: u32,
    },
    /// Raw UiAutomator query; types `text` when given, taps otherwise
    Query {
        query: String,
        text: Option<String>,
    },
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum DirectionSpec {
    Down,
    Up,
    Right,
    Left,
}

impl From<DirectionSpec> for ScrollDirection {
    fn from(spec: DirectionSpec) -> Self {
        match spec {
            DirectionSpec::Down => ScrollDirection::VerticalForward,
            DirectionSpec::Up => ScrollDirection::VerticalBackward,
            DirectionSpec::Right => ScrollDirection::HorizontalForward,
            DirectionSpec::Left => ScrollDirection::HorizontalBackward,
        }
    }
}

/// Parse a selector written as `id:<res-id>`, `tag:<test-tag>`, `text:<text>` or `query:<expr>`
pub fn parse_selector(s: &str) -> Result<Selector> {
    let (kind, value) = s
        .split_once(':')
        .ok_or_else(|| Error::Config(format!("Invalid selector '{}': expected <kind>:<value>", s)))?;

    if value.is_empty() {
        return Err(Error::Config(format!("Invalid selector '{}': empty value", s)));
    }

    match kind.trim() {
        "id" => Ok(Selector::id(value)),
        "tag" => Ok(Selector::tag(value)),
        "text" => Ok(Selector::text(value)),
        "query" => Ok(Selector::query(value)),
        other => Err(Error::Config(format!(
            "Unknown selector kind '{}'. Supported: id, tag, text, query",
            other
        ))),
    }
}

impl StepSpec {
    fn into_builder(self) -> Result<StepBuilder> {
        let mut step = match self.action {
            ActionSpec::Tap { target } => StepBuilder::tap(parse_selector(&target)?),
            ActionSpec::TapChild { parent, index, sub } => {
                let step = StepBuilder::tap_child(parse_selector(&parent)?, index);
                match sub {
                    Some(sub) => step.sub_selector(parse_selector(&sub)?),
                    None => step,
                }
            }
            ActionSpec::InputText { target, text } => {
                StepBuilder::input_text(parse_selector(&target)?, text)
            }
            ActionSpec::Scroll {
                target,
                direction,
                repeat,
                interval_ms,
            } => {
                let selector = target.as_deref().map(parse_selector).transpose()?;
                let mut step = StepBuilder::scroll(selector);
                if let Some(direction) = direction {
                    step = step.direction(direction.into());
                }
                with_repetition(step, repeat, interval_ms)
            }
            ActionSpec::HideKeyboard => StepBuilder::hide_keyboard(),
            ActionSpec::LongTap { target } => StepBuilder::long_tap(parse_selector(&target)?),
            ActionSpec::RepeatTap {
                target,
                repeat,
                interval_ms,
            } => with_repetition(
                StepBuilder::repeat_tap(parse_selector(&target)?),
                repeat,
                interval_ms,
            ),
            ActionSpec::KeyPress { key_code } => StepBuilder::key_press(key_code),
            ActionSpec::Query { query, text } => match text {
                Some(text) => StepBuilder::query_input(query, text),
                None => StepBuilder::query_tap(query),
            },
        };

        if let Some(wait_ms) = self.wait_ms {
            step = step.wait(Duration::from_millis(wait_ms));
        }
        if let Some(label) = self.screenshot {
            step = step.screenshot(label);
        }
        Ok(step)
    }
}

fn with_repetition(mut step: StepBuilder, repeat: Option<u32>, interval_ms: Option<u64>) -> StepBuilder {
    if let Some(repeat) = repeat {
        step = step.repeat(repeat);
    }
    if let Some(interval_ms) = interval_ms {
        step = step.interval(Duration::from_millis(interval_ms));
    }
    step
}

impl ScenarioFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn into_scenario(self) -> Result<Scenario> {
        let mut builder = Scenario::builder();
        if let Some(name) = self.name {
            builder = builder.title(name);
        }
        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        for step in self.steps {
            builder.push(step.into_builder()?);
        }
        builder.build()
    }
}

/// Load and validate a scenario file
pub fn load_scenario_file(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    ScenarioFile::parse(&content)?.into_scenario()
}
