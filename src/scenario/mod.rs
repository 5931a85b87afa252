//! Scenario model
//!
//! A scenario is an immutable, ordered list of [`EventAction`]s built with
//! [`ScenarioBuilder`]. Targets refer to scenarios by name; the
//! [`ScenarioCatalog`] turns a name into a scenario.

mod action;
mod builder;
pub mod file;
mod sample;

use std::path::PathBuf;

use crate::common::{paths, Error, Result};

pub use action::{
    ActionKind, EventAction, QueryOperation, ScreenshotLabel, ScrollDirection, Selector,
    DEFAULT_SCROLLABLE,
};
pub use builder::{Scenario, ScenarioBuilder, StepBuilder, DEFAULT_POST_WAIT};
pub use sample::{sample_scenario, SAMPLE_SCENARIO_NAME};

/// Resolves scenario names to built-in scenarios or YAML files
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    dir: Option<PathBuf>,
}

impl ScenarioCatalog {
    /// Catalog reading scenario files from `dir`
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Catalog reading scenario files from the config directory
    pub fn from_default_dir() -> Self {
        Self::new(paths::scenarios_dir())
    }

    /// Look a scenario up by name; built-ins take precedence over files
    pub fn resolve(&self, name: &str) -> Result<Scenario> {
        if name == SAMPLE_SCENARIO_NAME {
            return sample_scenario();
        }

        if let Some(dir) = &self.dir {
            for ext in ["yaml", "yml"] {
                let path = dir.join(format!("{}.{}", name, ext));
                if path.is_file() {
                    tracing::debug!(scenario = name, path = %path.display(), "Loading scenario file");
                    return file::load_scenario_file(&path);
                }
            }
        }

        Err(Error::ScenarioNotFound(name.to_string()))
    }

    /// Names of every scenario this catalog can resolve
    pub fn names(&self) -> Vec<String> {
        let mut names = vec![SAMPLE_SCENARIO_NAME.to_string()];

        if let Some(entries) = self.dir.as_ref().and_then(|dir| std::fs::read_dir(dir).ok()) {
            let mut files: Vec<String> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .is_some_and(|ext| ext == "yaml" || ext == "yml")
                })
                .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
                .filter(|name| name != SAMPLE_SCENARIO_NAME)
                .collect();
            files.sort();
            files.dedup();
            names.extend(files);
        }

        names
    }
}
