use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use hubsync_client::{ClientOptions, HubClient};
use hubsync_common::{HubSource, Instance, Result};
use tracing::debug;
use uuid::Uuid;

/// Builds the source used to talk to one instance.
pub trait SourceFactory: Send + Sync {
    fn build(&self, instance: &Instance) -> Result<Arc<dyn HubSource>>;
}

/// Default factory: one [`HubClient`] per instance.
#[derive(Debug, Clone, Default)]
pub struct HttpSourceFactory {
    options: ClientOptions,
}

impl HttpSourceFactory {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }
}

impl SourceFactory for HttpSourceFactory {
    fn build(&self, instance: &Instance) -> Result<Arc<dyn HubSource>> {
        Ok(Arc::new(HubClient::with_options(
            instance,
            self.options.clone(),
        )?))
    }
}

/// Owns the per-instance sources, keyed by instance id.
///
/// Entries are built lazily on first use and dropped when the instance is
/// removed or its credential changes; dropping a client drops its session.
pub struct ClientRegistry {
    factory: Arc<dyn SourceFactory>,
    clients: Mutex<HashMap<Uuid, Arc<dyn HubSource>>>,
}

impl ClientRegistry {
    pub fn new(factory: Arc<dyn SourceFactory>) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn http(options: ClientOptions) -> Self {
        Self::new(Arc::new(HttpSourceFactory::new(options)))
    }

    /// The cached source for `instance`, building it on first use.
    pub fn source_for(&self, instance: &Instance) -> Result<Arc<dyn HubSource>> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(source) = clients.get(&instance.id) {
            return Ok(source.clone());
        }

        debug!(instance_id = %instance.id, "Creating hub client");
        let source = self.factory.build(instance)?;
        clients.insert(instance.id, source.clone());
        Ok(source)
    }

    /// A throwaway source that is not registered, for trial authentication.
    pub fn build_detached(&self, instance: &Instance) -> Result<Arc<dyn HubSource>> {
        self.factory.build(instance)
    }

    /// Drops the cached source; returns whether one existed.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            debug!(instance_id = %id, "Dropped hub client");
        }
        removed
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
