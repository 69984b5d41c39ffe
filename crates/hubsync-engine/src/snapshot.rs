use std::collections::HashMap;

use hubsync_common::{AlertRecord, ContainerRecord, SystemDetailsRecord, SystemRecord};
use uuid::Uuid;

/// Consolidated view of the selected instance, published after every change.
///
/// Every part belongs to `instance_id`; parts are replaced wholesale when their
/// fetch completes and cleared together when the selection changes.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Incremented on every publication.
    pub version: u64,
    pub instance_id: Option<Uuid>,
    /// Sorted by name.
    pub systems: Vec<SystemRecord>,
    /// Keyed by the id of the system the details describe.
    pub system_details: HashMap<String, SystemDetailsRecord>,
    /// Keyed by system id.
    pub containers: HashMap<String, Vec<ContainerRecord>>,
    /// Alerts that are enabled and currently triggered.
    pub active_alerts: Vec<AlertRecord>,
    /// True while a systems fetch is in flight.
    pub loading: bool,
    /// Last failure of the systems fetch, cleared when a new one starts.
    pub last_error: Option<String>,
}

impl Snapshot {
    pub fn details_for(&self, system_id: &str) -> Option<&SystemDetailsRecord> {
        self.system_details.get(system_id)
    }

    pub fn containers_for(&self, system_id: &str) -> &[ContainerRecord] {
        self.containers
            .get(system_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn alerts_for<'a>(&'a self, system_id: &'a str) -> impl Iterator<Item = &'a AlertRecord> {
        self.active_alerts
            .iter()
            .filter(move |alert| alert.system.as_deref() == Some(system_id))
    }

    pub fn online_count(&self) -> usize {
        self.systems.iter().filter(|s| s.is_online()).count()
    }

    pub fn container_count(&self) -> usize {
        self.containers.values().map(Vec::len).sum()
    }

    /// Clears every data part, keeping the version counter.
    pub(crate) fn reset(&mut self, instance_id: Option<Uuid>) {
        *self = Snapshot {
            version: self.version,
            instance_id,
            ..Default::default()
        };
    }
}

/// Lifecycle of the current operation for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}
