//! Persistence for targets and screenshot runs

pub mod screenshots;
pub mod targets;

pub use screenshots::{list_runs, run_dir, RunDir};
pub use targets::TargetStore;
