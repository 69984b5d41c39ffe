//! In-process hub fake with scripted responses and injectable latency.

#![allow(dead_code)]

use async_trait::async_trait;
use hubsync_common::{
    AlertRecord, ContainerRecord, HubError, HubSource, Instance, Result, SystemDetailsRecord,
    SystemRecord,
};
use hubsync_engine::{ClientRegistry, SourceFactory, SyncOrchestrator};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Responses for one collection: queued steps first, then the fallback.
pub struct Scripted<T> {
    steps: Mutex<VecDeque<(Duration, Result<Vec<T>>)>>,
    fallback: Mutex<Vec<T>>,
    calls: AtomicUsize,
}

impl<T: Clone> Scripted<T> {
    fn new(fallback: Vec<T>) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queues a response delivered after `delay`.
    pub fn push(&self, delay: Duration, result: Result<Vec<T>>) {
        self.steps.lock().unwrap().push_back((delay, result));
    }

    pub fn set_fallback(&self, items: Vec<T>) {
        *self.fallback.lock().unwrap() = items;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self) -> Result<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }
}

pub struct FakeHub {
    pub systems: Scripted<SystemRecord>,
    pub details: Scripted<SystemDetailsRecord>,
    pub containers: Scripted<ContainerRecord>,
    pub alerts: Scripted<AlertRecord>,
    pub alert_filters: Mutex<Vec<Option<String>>>,
}

impl FakeHub {
    /// A hub whose every record is prefixed with `label`.
    pub fn labelled(label: &str) -> Arc<Self> {
        let s1 = format!("{label}-s1");
        let s2 = format!("{label}-s2");
        Arc::new(Self {
            systems: Scripted::new(vec![
                system(&s2, &format!("{label} web")),
                system(&s1, &format!("{label} db")),
            ]),
            details: Scripted::new(vec![details(&format!("{label}-d1"), &s1)]),
            containers: Scripted::new(vec![
                container(&format!("{label}-c1"), &s1),
                container(&format!("{label}-c2"), &s2),
                container(&format!("{label}-c3"), &s1),
            ]),
            alerts: Scripted::new(vec![
                alert(&format!("{label}-a1"), &s1, true),
                alert(&format!("{label}-a2"), &s2, false),
            ]),
            alert_filters: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl HubSource for FakeHub {
    async fn list_systems(&self) -> Result<Vec<SystemRecord>> {
        let mut systems = self.systems.next().await?;
        systems.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(systems)
    }

    async fn list_system_details(&self) -> Result<Vec<SystemDetailsRecord>> {
        self.details.next().await
    }

    async fn list_containers(&self, _filter: Option<&str>) -> Result<Vec<ContainerRecord>> {
        self.containers.next().await
    }

    async fn list_alerts(&self, filter: Option<&str>) -> Result<Vec<AlertRecord>> {
        self.alert_filters
            .lock()
            .unwrap()
            .push(filter.map(str::to_string));
        self.alerts.next().await
    }
}

/// Hands out the registered fake for each instance id.
#[derive(Default)]
pub struct FakeFactory {
    hubs: Mutex<HashMap<Uuid, Arc<FakeHub>>>,
}

impl FakeFactory {
    pub fn register(&self, instance: &Instance, hub: Arc<FakeHub>) {
        self.hubs.lock().unwrap().insert(instance.id, hub);
    }
}

impl SourceFactory for FakeFactory {
    fn build(&self, instance: &Instance) -> Result<Arc<dyn HubSource>> {
        match self.hubs.lock().unwrap().get(&instance.id) {
            Some(hub) => Ok(hub.clone()),
            None => Err(HubError::BadUrl(instance.url.clone())),
        }
    }
}

pub struct Harness {
    pub factory: Arc<FakeFactory>,
    pub orchestrator: SyncOrchestrator,
}

impl Harness {
    pub fn new() -> Self {
        let factory = Arc::new(FakeFactory::default());
        let clients = Arc::new(ClientRegistry::new(factory.clone()));
        Self {
            factory,
            orchestrator: SyncOrchestrator::new(clients),
        }
    }

    /// Registers a labelled fake under a fresh instance.
    pub fn hub(&self, label: &str) -> (Instance, Arc<FakeHub>) {
        let instance = Instance::new(
            label,
            format!("http://{label}.local:8090"),
            "me@example.com",
            "pw",
        );
        let hub = FakeHub::labelled(label);
        self.factory.register(&instance, hub.clone());
        (instance, hub)
    }
}

pub fn system(id: &str, name: &str) -> SystemRecord {
    SystemRecord {
        id: id.to_string(),
        name: name.to_string(),
        status: Some("up".to_string()),
        host: None,
        port: None,
        info: None,
        v: None,
        updated: None,
    }
}

pub fn details(id: &str, system: &str) -> SystemDetailsRecord {
    serde_json::from_value(json!({
        "id": id,
        "system": system,
        "hostname": format!("{system}.lan"),
    }))
    .unwrap()
}

pub fn container(id: &str, system: &str) -> ContainerRecord {
    serde_json::from_value(json!({
        "id": id,
        "name": id,
        "cpu": 1.0,
        "memory": 32.0,
        "net": 0.0,
        "status": "Up 2 hours",
        "image": "nginx",
        "system": system,
        "updated": 1700000000000i64
    }))
    .unwrap()
}

pub fn alert(id: &str, system: &str, triggered: bool) -> AlertRecord {
    serde_json::from_value(json!({
        "id": id,
        "name": "CPU",
        "system": system,
        "metric": "CPU",
        "threshold": 90,
        "enabled": true,
        "triggered": triggered
    }))
    .unwrap()
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(1)).await;
}
