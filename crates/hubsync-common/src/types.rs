use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Paginated list response returned by every collection endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<T> {
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items: Vec<T>,
}

/// Body of a successful password login or token refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    pub id: String,
    pub name: String,
    pub status: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub info: Option<SystemInfo>,
    pub v: Option<String>,
    pub updated: Option<String>,
}

/// Compact agent metrics embedded in a system record. Field names follow the hub wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub h: Option<String>,
    pub k: Option<String>,
    pub c: Option<u32>,
    pub t: Option<u32>,
    pub m: Option<String>,
    pub o: Option<String>,
    pub os: Option<u32>,
    pub u: Option<f64>,
    pub v: Option<String>,
    pub cpu: Option<f64>,
    pub mp: Option<f64>,
    pub dp: Option<f64>,
    pub b: Option<f64>,
    pub bb: Option<f64>,
    pub l1: Option<f64>,
    pub l5: Option<f64>,
    pub l15: Option<f64>,
    pub la: Option<Vec<f64>>,
    pub bat: Option<Vec<f64>>,
    pub g: Option<f64>,
    pub dt: Option<f64>,
    pub p: Option<bool>,
    pub ct: Option<u32>,
    pub efs: Option<HashMap<String, f64>>,
    pub sv: Option<Vec<i64>>,
}

impl SystemRecord {
    pub fn display_status(&self) -> String {
        let Some(status) = self.status.as_deref().map(str::to_lowercase) else {
            return "Unknown".to_string();
        };
        match status.as_str() {
            "up" | "online" => "Online".to_string(),
            "down" | "offline" => "Offline".to_string(),
            "pending" => "Pending".to_string(),
            other => capitalize(other),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(
            self.status.as_deref().map(str::to_lowercase).as_deref(),
            Some("up") | Some("online")
        )
    }

    pub fn cpu_percentage(&self) -> Option<f64> {
        self.info.as_ref().and_then(|info| info.cpu)
    }

    pub fn memory_percentage(&self) -> Option<f64> {
        self.info.as_ref().and_then(|info| info.mp)
    }

    pub fn disk_percentage(&self) -> Option<f64> {
        self.info.as_ref().and_then(|info| info.dp)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.info.as_ref().and_then(|info| info.dt)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatsRecord {
    pub id: String,
    pub created: String,
    pub stats: Option<SystemStatsDetail>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatsDetail {
    pub cpu: Option<f64>,
    pub mp: Option<f64>,
    pub dp: Option<f64>,
    pub ns: Option<f64>,
    pub nr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDetailsRecord {
    pub id: String,
    pub system: String,
    pub hostname: Option<String>,
    pub kernel: Option<String>,
    pub cores: Option<u32>,
    pub threads: Option<u32>,
    pub cpu: Option<String>,
    pub memory: Option<i64>,
    pub os: Option<u32>,
    pub os_name: Option<String>,
    pub arch: Option<String>,
    pub podman: Option<bool>,
    pub updated: Option<String>,
}

/// Docker health state, sent by the hub as an integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ContainerHealth {
    #[default]
    None,
    Starting,
    Healthy,
    Unhealthy,
}

impl TryFrom<u8> for ContainerHealth {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(ContainerHealth::None),
            1 => Ok(ContainerHealth::Starting),
            2 => Ok(ContainerHealth::Healthy),
            3 => Ok(ContainerHealth::Unhealthy),
            other => Err(format!("unknown container health value {other}")),
        }
    }
}

impl From<ContainerHealth> for u8 {
    fn from(health: ContainerHealth) -> Self {
        match health {
            ContainerHealth::None => 0,
            ContainerHealth::Starting => 1,
            ContainerHealth::Healthy => 2,
            ContainerHealth::Unhealthy => 3,
        }
    }
}

impl ContainerHealth {
    pub fn display_text(self) -> &'static str {
        match self {
            ContainerHealth::None => "No Health Check",
            ContainerHealth::Starting => "Starting",
            ContainerHealth::Healthy => "Healthy",
            ContainerHealth::Unhealthy => "Unhealthy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub cpu: f64,
    pub memory: f64,
    pub net: f64,
    #[serde(default)]
    pub health: ContainerHealth,
    pub status: String,
    pub image: String,
    pub system: String,
    /// Epoch milliseconds.
    pub updated: i64,
}

impl ContainerRecord {
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.updated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatsRecord {
    pub id: String,
    pub system: String,
    pub name: Option<String>,
    pub cpu: Option<f64>,
    pub mem: Option<f64>,
    pub created: Option<String>,
}

impl ContainerStatsRecord {
    pub fn container_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub name: String,
    pub system: Option<String>,
    pub metric: Option<String>,
    pub threshold: Option<f64>,
    pub enabled: Option<bool>,
    pub triggered: Option<bool>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

impl AlertRecord {
    /// Enabled (or not explicitly disabled) and currently firing.
    pub fn is_active(&self) -> bool {
        self.enabled != Some(false) && self.triggered == Some(true)
    }

    pub fn display_metric(&self) -> &str {
        self.metric.as_deref().unwrap_or("unknown")
    }

    pub fn display_threshold(&self) -> String {
        match self.threshold {
            Some(threshold) => format!("{threshold:.0}"),
            None => "-".to_string(),
        }
    }
}
