//! Event runner: drives one scenario through one device session

mod event_runner;
pub mod screenshot;

pub use event_runner::{EventRunner, RunnerSettings, RunnerState};
pub use screenshot::{auto_name, AUTO_NAME_PREFIX};
