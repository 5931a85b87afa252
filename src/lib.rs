//! Scenario Runner - scripted mobile UI automation
//!
//! Scenarios are ordered UI actions executed against a device through a
//! WebDriver-compatible automation server. Each step may save a screenshot,
//! and the screenshots of two runs can be compared with a pixel tolerance.

pub mod cli;
pub mod commands;
pub mod common;
pub mod coordinator;
pub mod diff;
pub mod driver;
pub mod runner;
pub mod scenario;
pub mod store;
pub mod target;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use coordinator::{Coordinator, RunState, ServerSettings, SharedServer};
pub use diff::{CompareResult, ComparedFile, DiffEngine};
pub use scenario::{Scenario, ScenarioCatalog};
pub use target::{Target, TargetId};
