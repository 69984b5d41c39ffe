//! Lists the systems of one hub.
//!
//! ```text
//! HUB_URL=http://localhost:8090 HUB_EMAIL=me@example.com HUB_PASSWORD=... \
//!     cargo run -p hubsync-client --example list_systems
//! ```

use hubsync_client::HubClient;
use hubsync_common::Instance;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::var("HUB_URL").unwrap_or_else(|_| "http://localhost:8090".to_string());
    let email = std::env::var("HUB_EMAIL")?;
    let password = std::env::var("HUB_PASSWORD")?;

    let client = HubClient::new(&Instance::new("example", url, email, password))?;

    let systems = client.fetch_systems().await?;
    let containers = client.fetch_containers(None).await?;
    let alerts = client.fetch_alerts(Some("enabled = true")).await?;

    for system in &systems {
        let count = containers.iter().filter(|c| c.system == system.id).count();
        println!(
            "{:<24} {:<8} cpu={:>5} containers={}",
            system.name,
            system.display_status(),
            system
                .cpu_percentage()
                .map(|cpu| format!("{cpu:.1}%"))
                .unwrap_or_else(|| "-".to_string()),
            count
        );
    }

    let firing = alerts.iter().filter(|a| a.is_active()).count();
    println!("{} systems, {} active alerts", systems.len(), firing);
    Ok(())
}
