use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hubsync_client::validate_base_url;
use hubsync_common::{HubError, Instance, InstanceStore, Result, SecretStore};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::orchestrator::SyncOrchestrator;

/// The configured instances and their lifecycle.
///
/// Credentials go to the [`SecretStore`] keyed by instance id; the
/// [`InstanceStore`] only ever sees the persisted form with an empty
/// credential. Selection changes are forwarded to the [`SyncOrchestrator`].
pub struct InstanceRegistry {
    secrets: Arc<dyn SecretStore>,
    store: Arc<dyn InstanceStore>,
    orchestrator: SyncOrchestrator,
    instances: Mutex<Vec<Instance>>,
}

impl InstanceRegistry {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        store: Arc<dyn InstanceStore>,
        orchestrator: SyncOrchestrator,
    ) -> Self {
        Self {
            secrets,
            store,
            orchestrator,
            instances: Mutex::new(Vec::new()),
        }
    }

    fn list(&self) -> MutexGuard<'_, Vec<Instance>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    /// Loads the stored instances and resumes syncing the saved selection,
    /// falling back to the first instance when it is missing or unknown.
    pub fn restore(&self) -> Result<Option<Uuid>> {
        let loaded = self.store.load()?;
        let saved = self.store.load_selected_id()?;
        let selected = saved
            .filter(|id| loaded.iter().any(|i| i.id == *id))
            .or_else(|| loaded.first().map(|i| i.id));

        info!(count = loaded.len(), ?selected, "Restored instances");
        *self.list() = loaded.iter().map(Instance::persisted).collect();

        match selected {
            Some(id) => {
                let instance = self.instance_with_credential(id)?;
                self.orchestrator.select_instance(instance.as_ref());
            }
            None => self.orchestrator.select_instance(None),
        }
        Ok(selected)
    }

    /// Persisted forms of every configured instance, in insertion order.
    pub fn instances(&self) -> Vec<Instance> {
        self.list().clone()
    }

    pub fn is_configured(&self) -> bool {
        !self.list().is_empty()
    }

    pub fn selected_id(&self) -> Option<Uuid> {
        self.orchestrator.selected_instance_id()
    }

    /// The stored instance merged with its secret; empty if none is stored.
    pub fn instance_with_credential(&self, id: Uuid) -> Result<Option<Instance>> {
        let Some(instance) = self.list().iter().find(|i| i.id == id).cloned() else {
            return Ok(None);
        };
        let credential = self.secrets.load(&id.to_string())?.unwrap_or_default();
        Ok(Some(instance.with_credential(credential)))
    }

    /// Trial authentication: fetches the system list through a client that is
    /// not registered anywhere.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id, url = %instance.url))]
    pub async fn verify_instance(&self, instance: &Instance) -> Result<()> {
        let source = self.orchestrator.clients().build_detached(instance)?;
        let systems = source.list_systems().await?;
        info!(systems = systems.len(), "Instance verified");
        Ok(())
    }

    fn normalized(instance: Instance) -> Result<Instance> {
        let url = Instance::normalize_url(&instance.url);
        validate_base_url(&url)?;
        Ok(Instance { url, ..instance })
    }

    /// Stores a new instance and selects it if nothing is selected yet.
    ///
    /// Nothing changes in memory unless the instance list was saved.
    pub fn add_instance(&self, instance: Instance) -> Result<()> {
        let instance = Self::normalized(instance)?;
        if self.list().iter().any(|i| i.id == instance.id) {
            return self.update_instance(instance);
        }

        let key = instance.id.to_string();
        self.secrets.save(&key, &instance.credential)?;
        {
            let mut list = self.list();
            let mut next = list.clone();
            next.push(instance.persisted());
            if let Err(err) = self.store.save(&next) {
                drop(list);
                if let Err(cleanup) = self.secrets.delete(&key) {
                    warn!(instance_id = %instance.id, error = %cleanup, "Orphaned secret");
                }
                return Err(err);
            }
            *list = next;
        }
        info!(instance_id = %instance.id, name = %instance.name, "Added instance");

        if self.orchestrator.selected_instance_id().is_none() {
            self.select(Some(&instance))?;
        }
        Ok(())
    }

    /// Replaces an instance's settings.
    ///
    /// The list is saved first; a failed save leaves everything as it was.
    /// Afterwards a non-empty credential replaces the stored secret, the cached
    /// client is dropped, and a selected instance is re-selected so its
    /// snapshot is rebuilt from scratch.
    pub fn update_instance(&self, instance: Instance) -> Result<()> {
        let instance = Self::normalized(instance)?;
        {
            let mut list = self.list();
            let Some(pos) = list.iter().position(|i| i.id == instance.id) else {
                warn!(instance_id = %instance.id, "Update for unknown instance");
                return Err(HubError::Store(format!("unknown instance {}", instance.id)));
            };
            let mut next = list.clone();
            next[pos] = instance.persisted();
            self.store.save(&next)?;
            *list = next;
        }
        info!(instance_id = %instance.id, "Updated instance");

        let rotated = if instance.credential.is_empty() {
            Ok(())
        } else {
            self.secrets.save(&instance.id.to_string(), &instance.credential)
        };
        self.orchestrator.clients().remove(instance.id);

        if self.orchestrator.selected_instance_id() == Some(instance.id) {
            let full = self.instance_with_credential(instance.id)?;
            self.select(full.as_ref())?;
        }
        rotated
    }

    /// Forgets an instance; if it was selected, the first remaining one takes over.
    ///
    /// A failed save of the list leaves the instance configured and syncing.
    pub fn remove_instance(&self, id: Uuid) -> Result<()> {
        let next = {
            let mut list = self.list();
            let remaining: Vec<Instance> = list.iter().filter(|i| i.id != id).cloned().collect();
            self.store.save(&remaining)?;
            *list = remaining;
            list.first().map(|i| i.id)
        };
        info!(instance_id = %id, "Removed instance");

        self.orchestrator.clients().remove(id);
        let forgotten = self.secrets.delete(&id.to_string());

        if self.orchestrator.selected_instance_id() == Some(id) {
            let next = match next {
                Some(next) => self.instance_with_credential(next)?,
                None => None,
            };
            self.select(next.as_ref())?;
        }
        forgotten
    }

    /// Selects a stored instance by id, or clears the selection.
    pub fn select_instance(&self, id: Option<Uuid>) -> Result<()> {
        let instance = match id {
            Some(id) => Some(
                self.instance_with_credential(id)?
                    .ok_or_else(|| HubError::Store(format!("unknown instance {id}")))?,
            ),
            None => None,
        };
        self.select(instance.as_ref())
    }

    fn select(&self, instance: Option<&Instance>) -> Result<()> {
        self.orchestrator.select_instance(instance);
        self.store.save_selected_id(instance.map(|i| i.id))
    }
}
