use std::env;
use std::sync::Arc;

use color_eyre::eyre::{self, WrapErr};
use hubsync_common::{
    HubError, Instance, InstanceStore, MemorySecretStore, ResourceKind, SecretStore,
};
use hubsync_engine::{
    ClientRegistry, InstanceRegistry, PollScheduler, Snapshot, SyncConfig, SyncOrchestrator,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod state_file;

use state_file::JsonInstanceStore;

const DEFAULT_STATE_FILE: &str = "hubsync-instances.json";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hubsync=debug")),
        )
        .init();

    info!("Starting hubsync...");
    let config = SyncConfig::from_env();

    let state_path =
        env::var("HUBSYNC_STATE_FILE").unwrap_or_else(|_| DEFAULT_STATE_FILE.to_string());
    let store = Arc::new(JsonInstanceStore::new(&state_path));
    let secrets = Arc::new(MemorySecretStore::new());
    info!(path = %state_path, "Using state file");

    let configured_url = env::var("HUBSYNC_URL").ok().map(|url| Instance::normalize_url(&url));
    let password = env::var("HUBSYNC_PASSWORD").unwrap_or_default();

    // Secrets live in memory only, so stored instances get the configured
    // credential again on every start.
    if !password.is_empty() {
        for instance in store.load()? {
            if configured_url.as_ref().map_or(true, |url| *url == instance.url) {
                secrets.save(&instance.id.to_string(), &password)?;
            }
        }
    }

    let clients = Arc::new(ClientRegistry::http(config.client.clone()));
    let orchestrator = SyncOrchestrator::new(clients);
    orchestrator.set_diagnostic_hook(Some(Arc::new(|kind: ResourceKind, err: &HubError| {
        warn!(%kind, error = %err, "Supplementary data unavailable");
    })));

    let registry = InstanceRegistry::new(secrets, store, orchestrator.clone());
    registry.restore()?;

    if let Some(url) = configured_url {
        if !registry.instances().iter().any(|i| i.url == url) {
            let name = env::var("HUBSYNC_NAME").unwrap_or_else(|_| "Beszel".to_string());
            let email = env::var("HUBSYNC_EMAIL").unwrap_or_default();
            let instance = Instance::new(name, url, email, password);

            info!(url = %instance.url, "Verifying configured hub");
            registry
                .verify_instance(&instance)
                .await
                .wrap_err_with(|| format!("Could not sign in to {}", instance.url))?;
            registry.add_instance(instance)?;
        }
    }

    if !registry.is_configured() {
        warn!("No hub configured; set HUBSYNC_URL, HUBSYNC_EMAIL and HUBSYNC_PASSWORD");
        return Ok(());
    }

    // Selecting the instance above already issued the first fetches.
    let scheduler = PollScheduler::with_debounce(Arc::new(orchestrator.clone()), config.debounce);
    scheduler.arm(config.refresh_interval_secs);

    let mut updates = orchestrator.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.wrap_err("Failed to listen for Ctrl-C")?;
                info!("Received Ctrl-C, shutting down");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                report(&snapshot);
            }
        }
    }

    scheduler.stop();
    orchestrator.cancel_all();
    Ok(())
}

fn report(snapshot: &Snapshot) {
    if snapshot.loading {
        debug!(version = snapshot.version, "Refreshing");
        return;
    }
    match &snapshot.last_error {
        Some(error) => warn!(version = snapshot.version, %error, "Hub unavailable"),
        None => info!(
            version = snapshot.version,
            "{}/{} systems online, {} containers, {} active alerts",
            snapshot.online_count(),
            snapshot.systems.len(),
            snapshot.container_count(),
            snapshot.active_alerts.len(),
        ),
    }
}
