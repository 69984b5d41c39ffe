//! Refresh orchestration for hub snapshots.
//!
//! [`SyncOrchestrator`] owns the selected instance and fans out one fetch per
//! resource kind, [`PollScheduler`] re-triggers those fetches on an interval,
//! and [`InstanceRegistry`] manages the configured instances and their
//! credentials. Consumers read the published [`Snapshot`] through
//! [`SyncOrchestrator::subscribe`].

pub mod clients;
pub mod config;
pub mod instances;
pub mod orchestrator;
pub mod scheduler;
pub mod snapshot;

pub use hubsync_common as common;

pub use clients::{ClientRegistry, HttpSourceFactory, SourceFactory};
pub use config::{clamp_interval, SyncConfig};
pub use instances::InstanceRegistry;
pub use orchestrator::{DiagnosticHook, SyncOrchestrator, ENABLED_ALERTS_FILTER};
pub use scheduler::{PollScheduler, Refresh};
pub use snapshot::{OperationState, Snapshot};
