use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::{HubError, Instance, Result};

/// Credential storage keyed by instance id (a keychain in a desktop build).
pub trait SecretStore: Send + Sync {
    fn save(&self, key: &str, value: &str) -> Result<()>;
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// Persistence for the instance list and the selected-instance slot.
///
/// Implementations receive and return persisted forms only: credentials are
/// always empty on both sides of this contract.
pub trait InstanceStore: Send + Sync {
    fn load(&self) -> Result<Vec<Instance>>;
    fn save(&self, instances: &[Instance]) -> Result<()>;
    fn load_selected_id(&self) -> Result<Option<Uuid>>;
    fn save_selected_id(&self, id: Option<Uuid>) -> Result<()>;
}

fn poisoned(what: &str) -> HubError {
    HubError::Store(format!("{what} lock poisoned"))
}

// In-memory secret storage for development/testing
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Default::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.secrets
            .lock()
            .map_err(|_| poisoned("secret store"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .secrets
            .lock()
            .map_err(|_| poisoned("secret store"))?
            .get(key)
            .cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.secrets
            .lock()
            .map_err(|_| poisoned("secret store"))?
            .remove(key);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StoredInstances {
    instances: Vec<Instance>,
    selected: Option<Uuid>,
}

// In-memory instance list for development/testing
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    inner: Mutex<StoredInstances>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Default::default()
    }
}

impl InstanceStore for MemoryInstanceStore {
    fn load(&self) -> Result<Vec<Instance>> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| poisoned("instance store"))?
            .instances
            .clone())
    }

    fn save(&self, instances: &[Instance]) -> Result<()> {
        self.inner
            .lock()
            .map_err(|_| poisoned("instance store"))?
            .instances = instances.iter().map(Instance::persisted).collect();
        Ok(())
    }

    fn load_selected_id(&self) -> Result<Option<Uuid>> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| poisoned("instance store"))?
            .selected)
    }

    fn save_selected_id(&self, id: Option<Uuid>) -> Result<()> {
        self.inner
            .lock()
            .map_err(|_| poisoned("instance store"))?
            .selected = id;
        Ok(())
    }
}
