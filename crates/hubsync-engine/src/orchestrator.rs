use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hubsync_common::{
    AlertRecord, ContainerRecord, HubError, HubSource, Instance, ResourceKind, Result,
    SystemDetailsRecord, SystemRecord,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clients::ClientRegistry;
use crate::snapshot::{OperationState, Snapshot};

/// Server-side filter for the alerts kind; triggered ones are picked locally.
pub const ENABLED_ALERTS_FILTER: &str = "enabled = true";

/// Observer for failures of the supplementary kinds, which are otherwise silent.
pub type DiagnosticHook = Arc<dyn Fn(ResourceKind, &HubError) + Send + Sync>;

struct Operation {
    generation: u64,
    token: CancellationToken,
    state: OperationState,
}

struct Selection {
    instance_id: Uuid,
    source: Arc<dyn HubSource>,
}

#[derive(Default)]
struct State {
    selection: Option<Selection>,
    operations: HashMap<ResourceKind, Operation>,
    next_generation: u64,
    snapshot: Snapshot,
}

impl State {
    fn is_current(&self, kind: ResourceKind, generation: u64) -> bool {
        self.operations
            .get(&kind)
            .is_some_and(|op| op.generation == generation)
    }

    fn cancel_all(&mut self) {
        for op in self.operations.values_mut() {
            op.token.cancel();
            if op.state == OperationState::Running {
                op.state = OperationState::Cancelled;
            }
        }
    }
}

struct Inner {
    clients: Arc<ClientRegistry>,
    state: Mutex<State>,
    publisher: watch::Sender<Arc<Snapshot>>,
    hook: Mutex<Option<DiagnosticHook>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut State) {
        state.snapshot.version += 1;
        self.publisher.send_replace(Arc::new(state.snapshot.clone()));
    }

    /// Write-back of a finished operation. Superseded or cancelled
    /// operations never touch the snapshot.
    fn complete(
        &self,
        kind: ResourceKind,
        generation: u64,
        token: &CancellationToken,
        outcome: Result<Fetched>,
    ) {
        let mut state = self.lock();
        if token.is_cancelled() || !state.is_current(kind, generation) {
            debug!(%kind, generation, "Discarding superseded result");
            return;
        }

        let mut failure = None;
        let next_state = match outcome {
            Ok(fetched) => {
                fetched.apply(&mut state.snapshot);
                OperationState::Completed
            }
            Err(err) if err.is_cancelled() => OperationState::Cancelled,
            Err(err) => {
                if kind.is_primary() {
                    warn!(%kind, error = %err, "Refresh failed");
                    state.snapshot.last_error = Some(err.to_string());
                } else {
                    debug!(%kind, error = %err, "Supplementary refresh failed");
                    failure = Some(err);
                }
                OperationState::Failed
            }
        };

        if let Some(op) = state.operations.get_mut(&kind) {
            op.state = next_state;
        }
        if kind.is_primary() {
            state.snapshot.loading = false;
        }
        self.publish(&mut state);
        drop(state);

        if let Some(err) = failure {
            let hook = self.hook.lock().unwrap_or_else(PoisonError::into_inner).clone();
            if let Some(hook) = hook {
                hook(kind, &err);
            }
        }
    }
}

/// Clears the loading flag if a systems task ends without reaching its
/// write-back, for example when the runtime drops it mid-flight.
struct LoadingGuard {
    inner: Arc<Inner>,
    generation: u64,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        if state.snapshot.loading && state.is_current(ResourceKind::Systems, self.generation) {
            state.snapshot.loading = false;
            self.inner.publish(&mut state);
        }
    }
}

/// Fetched data for one kind, already shaped for the snapshot.
enum Fetched {
    Systems(Vec<SystemRecord>),
    Details(HashMap<String, SystemDetailsRecord>),
    Containers(HashMap<String, Vec<ContainerRecord>>),
    Alerts(Vec<AlertRecord>),
}

impl Fetched {
    async fn load(source: &dyn HubSource, kind: ResourceKind) -> Result<Self> {
        Ok(match kind {
            ResourceKind::Systems => Fetched::Systems(source.list_systems().await?),
            ResourceKind::Details => Fetched::Details(
                source
                    .list_system_details()
                    .await?
                    .into_iter()
                    .map(|details| (details.system.clone(), details))
                    .collect(),
            ),
            ResourceKind::Containers => {
                let mut grouped: HashMap<String, Vec<ContainerRecord>> = HashMap::new();
                for container in source.list_containers(None).await? {
                    grouped
                        .entry(container.system.clone())
                        .or_default()
                        .push(container);
                }
                Fetched::Containers(grouped)
            }
            ResourceKind::Alerts => Fetched::Alerts(
                source
                    .list_alerts(Some(ENABLED_ALERTS_FILTER))
                    .await?
                    .into_iter()
                    .filter(AlertRecord::is_active)
                    .collect(),
            ),
        })
    }

    fn apply(self, snapshot: &mut Snapshot) {
        match self {
            Fetched::Systems(systems) => snapshot.systems = systems,
            Fetched::Details(details) => snapshot.system_details = details,
            Fetched::Containers(containers) => snapshot.containers = containers,
            Fetched::Alerts(alerts) => snapshot.active_alerts = alerts,
        }
    }
}

/// Single owner of the selected instance and its snapshot.
///
/// Each resource kind has at most one operation in flight. Starting a kind
/// cancels its previous operation first, and an operation writes back only if
/// it is still the current one for its kind, so the last started fetch wins
/// regardless of completion order.
///
/// Control methods are synchronous and spawn onto the ambient tokio runtime.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    pub fn new(clients: Arc<ClientRegistry>) -> Self {
        let (publisher, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            inner: Arc::new(Inner {
                clients,
                state: Mutex::new(State::default()),
                publisher,
                hook: Mutex::new(None),
            }),
        }
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.inner.clients
    }

    /// Receives every published snapshot version.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.inner.publisher.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.publisher.borrow().clone()
    }

    pub fn selected_instance_id(&self) -> Option<Uuid> {
        self.inner.lock().selection.as_ref().map(|s| s.instance_id)
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().snapshot.loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().snapshot.last_error.clone()
    }

    pub fn operation_state(&self, kind: ResourceKind) -> OperationState {
        self.inner
            .lock()
            .operations
            .get(&kind)
            .map(|op| op.state)
            .unwrap_or_default()
    }

    pub fn set_diagnostic_hook(&self, hook: Option<DiagnosticHook>) {
        *self.inner.hook.lock().unwrap_or_else(PoisonError::into_inner) = hook;
    }

    /// Switches the snapshot to `instance` (which must carry its credential).
    ///
    /// All in-flight operations are cancelled and every snapshot part is
    /// cleared before the four kinds are started for the new instance.
    /// `None` clears everything and starts nothing.
    pub fn select_instance(&self, instance: Option<&Instance>) {
        let mut state = self.inner.lock();
        state.cancel_all();
        state.selection = None;
        state.snapshot.reset(instance.map(|i| i.id));

        let Some(instance) = instance else {
            info!("Cleared instance selection");
            self.inner.publish(&mut state);
            return;
        };

        match self.inner.clients.source_for(instance) {
            Ok(source) => {
                info!(instance_id = %instance.id, name = %instance.name, "Selected instance");
                state.selection = Some(Selection {
                    instance_id: instance.id,
                    source,
                });
                self.inner.publish(&mut state);
                for kind in ResourceKind::ALL {
                    self.start_locked(&mut state, kind);
                }
            }
            Err(err) => {
                warn!(instance_id = %instance.id, error = %err, "Cannot create client for instance");
                state.snapshot.last_error = Some(err.to_string());
                self.inner.publish(&mut state);
            }
        }
    }

    /// Restarts all four kinds for the selected instance; no-op without one.
    pub fn refresh_all(&self) {
        let mut state = self.inner.lock();
        for kind in ResourceKind::ALL {
            self.start_locked(&mut state, kind);
        }
    }

    /// Restarts a single kind.
    pub fn refresh_kind(&self, kind: ResourceKind) {
        let mut state = self.inner.lock();
        self.start_locked(&mut state, kind);
    }

    /// Cancels every in-flight operation without clearing the snapshot.
    pub fn cancel_all(&self) {
        let mut state = self.inner.lock();
        state.cancel_all();
        if state.snapshot.loading {
            state.snapshot.loading = false;
            self.inner.publish(&mut state);
        }
    }

    fn start_locked(&self, state: &mut State, kind: ResourceKind) {
        let Some(selection) = state.selection.as_ref() else {
            return;
        };
        let source = selection.source.clone();
        let instance_id = selection.instance_id;

        if let Some(previous) = state.operations.get_mut(&kind) {
            previous.token.cancel();
            if previous.state == OperationState::Running {
                debug!(%kind, generation = previous.generation, "Cancelling superseded operation");
                previous.state = OperationState::Cancelled;
            }
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let token = CancellationToken::new();
        state.operations.insert(
            kind,
            Operation {
                generation,
                token: token.clone(),
                state: OperationState::Running,
            },
        );

        if kind.is_primary() {
            state.snapshot.loading = true;
            state.snapshot.last_error = None;
            self.inner.publish(state);
        }

        debug!(%kind, %instance_id, generation, "Starting refresh");
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _loading = kind.is_primary().then(|| LoadingGuard {
                inner: inner.clone(),
                generation,
            });
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(HubError::Cancelled),
                result = Fetched::load(source.as_ref(), kind) => result,
            };
            inner.complete(kind, generation, &token, outcome);
        });
    }
}
