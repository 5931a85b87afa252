//! Persisted target list
//!
//! Stored as a JSON array. A missing or unreadable file falls back to the
//! sample target, and whatever was loaded is written straight back.

use std::path::{Path, PathBuf};

use crate::common::{paths, Error, Result};
use crate::target::{Target, TargetId};

/// Encode a target list as pretty JSON
pub fn encode(targets: &[Target]) -> Result<String> {
    Ok(serde_json::to_string_pretty(targets)?)
}

/// Decode a target list from JSON
pub fn decode(content: &str) -> Result<Vec<Target>> {
    Ok(serde_json::from_str(content)?)
}

/// Target list backed by a JSON file
#[derive(Debug)]
pub struct TargetStore {
    path: PathBuf,
    targets: Vec<Target>,
}

impl TargetStore {
    /// Load the store from the default location
    pub fn load_default() -> Result<Self> {
        let path = paths::targets_path()
            .ok_or_else(|| Error::Config("Cannot determine data directory".to_string()))?;
        Self::load(path)
    }

    /// Load targets from `path`, falling back to the sample target, and persist the result
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let targets = match std::fs::read_to_string(&path) {
            Ok(content) => match decode(&content) {
                Ok(targets) => targets,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Target list is corrupt, using sample target");
                    vec![Target::sample()]
                }
            },
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No target list, using sample target");
                vec![Target::sample()]
            }
        };

        let store = Self { path, targets };
        store.save()?;
        Ok(store)
    }

    /// Write the list to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, encode(&self.targets)?)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn get(&self, id: TargetId) -> Result<&Target> {
        self.targets
            .iter()
            .find(|t| t.id == id)
            .ok_or(Error::TargetNotFound(id.0))
    }

    /// Id the next added target receives
    pub fn next_id(&self) -> TargetId {
        self.targets
            .iter()
            .map(|t| t.id)
            .max()
            .map(TargetId::next)
            .unwrap_or(TargetId(0))
    }

    /// Add a target, assigning it the next id, and persist
    pub fn add(&mut self, mut target: Target) -> Result<TargetId> {
        target.id = self.next_id();
        let id = target.id;
        self.targets.push(target);
        self.save()?;
        Ok(id)
    }

    /// Replace the target with the same id as `target` and persist
    pub fn replace(&mut self, target: Target) -> Result<()> {
        let slot = self
            .targets
            .iter_mut()
            .find(|t| t.id == target.id)
            .ok_or(Error::TargetNotFound(target.id.0))?;
        *slot = target;
        self.save()
    }

    /// Remove a target and persist
    pub fn remove(&mut self, id: TargetId) -> Result<Target> {
        let index = self
            .targets
            .iter()
            .position(|t| t.id == id)
            .ok_or(Error::TargetNotFound(id.0))?;
        let removed = self.targets.remove(index);
        self.save()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{AutomationConfig, DeviceInfo};

    fn target(id: u64, name: &str) -> Target {
        Target {
            id: TargetId(id),
            name: name.to_string(),
            device_info: DeviceInfo::new("Pixel Tablet", 48, 96),
            scenario_name: "smoke".to_string(),
            configuration: AutomationConfig::default(),
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let targets = vec![target(0, "a"), target(5, "b")];
        let decoded = decode(&encode(&targets).unwrap()).unwrap();
        assert_eq!(decoded, targets);
    }

    #[test]
    fn test_missing_file_falls_back_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("targets.json");

        let store = TargetStore::load(&path).unwrap();
        assert_eq!(store.targets(), &[Target::sample()]);
        assert!(path.exists());
        assert_eq!(decode(&std::fs::read_to_string(&path).unwrap()).unwrap(), vec![Target::sample()]);
    }

    #[test]
    fn test_corrupt_file_falls_back_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = TargetStore::load(&path).unwrap();
        assert_eq!(store.targets().len(), 1);
        assert!(decode(&std::fs::read_to_string(&path).unwrap()).is_ok());
    }

    #[test]
    fn test_add_uses_max_plus_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(&path, encode(&[target(2, "a"), target(7, "b")]).unwrap()).unwrap();

        let mut store = TargetStore::load(&path).unwrap();
        assert_eq!(store.next_id(), TargetId(8));
        let id = store.add(target(0, "c")).unwrap();
        assert_eq!(id, TargetId(8));

        store.remove(TargetId(7)).unwrap();
        assert_eq!(store.next_id(), TargetId(9));
        assert!(matches!(store.remove(TargetId(7)), Err(Error::TargetNotFound(7))));

        let reloaded = TargetStore::load(&path).unwrap();
        let ids: Vec<_> = reloaded.targets().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TargetId(2), TargetId(8)]);
    }

    #[test]
    fn test_replace_persists_and_keeps_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(&path, encode(&[target(2, "a"), target(7, "b")]).unwrap()).unwrap();

        let mut store = TargetStore::load(&path).unwrap();
        let mut edited = store.get(TargetId(7)).unwrap().clone();
        edited.name = "renamed".to_string();
        edited.configuration.port = 4724;
        store.replace(edited.clone()).unwrap();

        let reloaded = TargetStore::load(&path).unwrap();
        assert_eq!(reloaded.targets(), &[target(2, "a"), edited]);
        assert_eq!(reloaded.next_id(), TargetId(8));

        assert!(matches!(store.replace(target(3, "c")), Err(Error::TargetNotFound(3))));
        assert_eq!(TargetStore::load(&path).unwrap().targets().len(), 2);
    }

    #[test]
    fn test_empty_list_next_id_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(&path, "[]").unwrap();

        let store = TargetStore::load(&path).unwrap();
        assert!(store.targets().is_empty());
        assert_eq!(store.next_id(), TargetId(0));
    }
}
