// Shared model, error taxonomy and collaborator contracts for the hub sync engine.

use std::fmt;

use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use uuid;

mod instance;
mod storage;
mod types;

pub use instance::{looks_like_jwt, CredentialKind, Instance};
pub use storage::{InstanceStore, MemoryInstanceStore, MemorySecretStore, SecretStore};
pub use types::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("Invalid URL: {0}")]
    BadUrl(String),

    #[error("Authentication required: no credential configured")]
    AuthenticationRequired,

    #[error("Authentication failed (HTTP {status})")]
    AuthenticationFailed { status: u16 },

    #[error("HTTP {status} error for {url}")]
    Http { status: u16, url: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl HubError {
    /// HTTP status carried by the error, if it came from a hub response.
    pub fn status(&self) -> Option<u16> {
        match self {
            HubError::Http { status, .. } | HubError::AuthenticationFailed { status } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// A 404 on a collection endpoint: the collection is not provisioned on this hub.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HubError::Http { status: 404, .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, HubError::Cancelled)
    }
}

// Define the primary Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

/// The four resource categories tracked per selected instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Systems,
    Details,
    Containers,
    Alerts,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Systems,
        ResourceKind::Details,
        ResourceKind::Containers,
        ResourceKind::Alerts,
    ];

    /// Only the primary kind surfaces errors to the presentation layer.
    pub fn is_primary(self) -> bool {
        self == ResourceKind::Systems
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Systems => "systems",
            ResourceKind::Details => "details",
            ResourceKind::Containers => "containers",
            ResourceKind::Alerts => "alerts",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed read access to one hub instance.
///
/// Implemented by the HTTP client; the sync engine only talks to hubs through
/// this trait so it can run against in-process fakes.
#[async_trait]
pub trait HubSource: Send + Sync {
    /// All systems, sorted by name (case-sensitive, ascending).
    async fn list_systems(&self) -> Result<Vec<SystemRecord>>;

    /// All system details. A hub without the collection yields an empty list.
    async fn list_system_details(&self) -> Result<Vec<SystemDetailsRecord>>;

    /// All containers matching `filter`. A hub without the collection yields an empty list.
    async fn list_containers(&self, filter: Option<&str>) -> Result<Vec<ContainerRecord>>;

    /// All alerts matching `filter`.
    async fn list_alerts(&self, filter: Option<&str>) -> Result<Vec<AlertRecord>>;
}
