use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use hubsync_common::{HubError, Instance, InstanceStore, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    instances: Vec<Instance>,
    #[serde(default)]
    selected: Option<Uuid>,
}

/// Instance list and selection persisted as one JSON document.
///
/// Credentials never reach the file: instances are written in their
/// persisted form and the credential field is not serialized at all.
pub struct JsonInstanceStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl JsonInstanceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StateFile> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StateFile::default()),
            Err(e) => return Err(store_error(&self.path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| store_error(&self.path, e))
    }

    fn write(&self, state: &StateFile) -> Result<()> {
        let json = serde_json::to_vec_pretty(state).map_err(|e| store_error(&self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| store_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| store_error(&self.path, e))?;
        debug!(path = %self.path.display(), "Saved state file");
        Ok(())
    }

    fn update(&self, change: impl FnOnce(&mut StateFile)) -> Result<()> {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.read()?;
        change(&mut state);
        self.write(&state)
    }
}

fn store_error(path: &Path, err: impl std::fmt::Display) -> HubError {
    HubError::Store(format!("{}: {err}", path.display()))
}

impl InstanceStore for JsonInstanceStore {
    fn load(&self) -> Result<Vec<Instance>> {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.instances)
    }

    fn save(&self, instances: &[Instance]) -> Result<()> {
        let persisted: Vec<Instance> = instances.iter().map(Instance::persisted).collect();
        self.update(|state| state.instances = persisted)
    }

    fn load_selected_id(&self) -> Result<Option<Uuid>> {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.selected)
    }

    fn save_selected_id(&self, id: Option<Uuid>) -> Result<()> {
        self.update(|state| state.selected = id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, JsonInstanceStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonInstanceStore::new(dir.path().join("instances.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.load_selected_id().unwrap(), None);
    }

    #[test]
    fn test_credentials_never_written() {
        let (_dir, store) = store();
        let instance = Instance::new("home", "http://hub.local", "me@example.com", "hunter2");
        store.save(&[instance.clone()]).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("hunter2"));
        assert!(!raw.contains("credential"));

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, instance.id);
        assert_eq!(loaded[0].url, "http://hub.local");
        assert!(loaded[0].credential.is_empty());
    }

    #[test]
    fn test_selection_and_list_are_independent() {
        let (_dir, store) = store();
        let a = Instance::new("a", "http://a.local", "me@example.com", "pw");
        let b = Instance::new("b", "http://b.local", "me@example.com", "pw");

        store.save_selected_id(Some(b.id)).unwrap();
        store.save(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(store.load_selected_id().unwrap(), Some(b.id));

        store.save_selected_id(None).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
        assert_eq!(store.load_selected_id().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_store_error() {
        let (_dir, store) = store();
        fs::write(store.path(), b"{ not json").unwrap();
        assert!(matches!(store.load(), Err(HubError::Store(_))));
    }
}
