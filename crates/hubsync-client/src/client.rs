use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use hubsync_common::{
    AlertRecord, ContainerRecord, ContainerStatsRecord, HubSource, Instance, Result,
    SystemDetailsRecord, SystemRecord, SystemStatsRecord,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{paths, parse_base_url, ClientOptions, PageQuery, PagedFetcher, SessionManager};

/// Server-side filter selecting the records of one system.
pub fn system_filter(system_id: &str) -> String {
    format!("system = '{}'", system_id.replace('\'', "\\'"))
}

/// Typed operations against one hub instance.
///
/// `HubClient` is thread-safe and is meant to be shared through an `Arc`; all
/// clones of that `Arc` share one session and therefore one cached token.
pub struct HubClient {
    instance_id: Uuid,
    session: Arc<SessionManager>,
    fetcher: PagedFetcher,
}

impl HubClient {
    pub fn new(instance: &Instance) -> Result<Self> {
        Self::with_options(instance, ClientOptions::default())
    }

    pub fn with_options(instance: &Instance, options: ClientOptions) -> Result<Self> {
        parse_base_url(&instance.url)?;
        let http = options.build_http_client()?;
        let session = Arc::new(SessionManager::new(http.clone(), instance));
        let fetcher = PagedFetcher::new(http, instance.url.clone(), session.clone(), options.page_size);

        Ok(Self {
            instance_id: instance.id,
            session,
            fetcher,
        })
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn fetcher(&self) -> &PagedFetcher {
        &self.fetcher
    }

    /// All systems, sorted by name (case-sensitive, ascending).
    #[instrument(skip(self), fields(instance = %self.instance_id))]
    pub async fn fetch_systems(&self) -> Result<Vec<SystemRecord>> {
        let mut systems: Vec<SystemRecord> =
            self.fetcher.fetch_all_pages(paths::SYSTEMS, None).await?;
        systems.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(systems)
    }

    #[instrument(skip(self), fields(instance = %self.instance_id))]
    pub async fn fetch_system_details(&self) -> Result<Vec<SystemDetailsRecord>> {
        absent_as_empty(
            paths::SYSTEM_DETAILS,
            self.fetcher
                .fetch_all_pages(paths::SYSTEM_DETAILS, None)
                .await,
        )
    }

    #[instrument(skip(self), fields(instance = %self.instance_id))]
    pub async fn fetch_containers(&self, filter: Option<&str>) -> Result<Vec<ContainerRecord>> {
        absent_as_empty(
            paths::CONTAINERS,
            self.fetcher.fetch_all_pages(paths::CONTAINERS, filter).await,
        )
    }

    pub async fn fetch_containers_for_system(&self, system_id: &str) -> Result<Vec<ContainerRecord>> {
        let filter = system_filter(system_id);
        self.fetch_containers(Some(filter.as_str())).await
    }

    #[instrument(skip(self), fields(instance = %self.instance_id))]
    pub async fn fetch_alerts(&self, filter: Option<&str>) -> Result<Vec<AlertRecord>> {
        self.fetcher.fetch_all_pages(paths::ALERTS, filter).await
    }

    /// The `limit` most recently created alerts.
    pub async fn fetch_latest_alerts(&self, limit: u32) -> Result<Vec<AlertRecord>> {
        let query = PageQuery::default().with_per_page(limit).with_sort("-created");
        Ok(self.fetcher.fetch(paths::ALERTS, &query).await?.items)
    }

    /// The `limit` newest stat samples of one system.
    pub async fn fetch_system_stats(
        &self,
        system_id: &str,
        limit: u32,
    ) -> Result<Vec<SystemStatsRecord>> {
        let filter = system_filter(system_id);
        let query = PageQuery::default()
            .with_per_page(limit)
            .with_sort("-created")
            .with_filter(Some(filter.as_str()));
        absent_as_empty(
            paths::SYSTEM_STATS,
            self.fetcher
                .fetch(paths::SYSTEM_STATS, &query)
                .await
                .map(|page| page.items),
        )
    }

    /// Latest stat sample per container of one system.
    ///
    /// Samples are requested newest-first, so the first occurrence of each
    /// container id is its most recent one.
    pub async fn fetch_container_stats(
        &self,
        system_id: &str,
        limit: u32,
    ) -> Result<Vec<ContainerStatsRecord>> {
        let filter = system_filter(system_id);
        let query = PageQuery::default()
            .with_per_page(limit.saturating_mul(100))
            .with_sort("-created")
            .with_filter(Some(filter.as_str()));
        let samples = absent_as_empty(
            paths::CONTAINER_STATS,
            self.fetcher
                .fetch(paths::CONTAINER_STATS, &query)
                .await
                .map(|page| page.items),
        )?;
        Ok(latest_per_container(samples))
    }
}

fn latest_per_container(samples: Vec<ContainerStatsRecord>) -> Vec<ContainerStatsRecord> {
    let mut seen = HashSet::new();
    samples
        .into_iter()
        .filter(|sample| seen.insert(sample.container_id().to_string()))
        .collect()
}

/// Older hubs lack some collections; their 404 reads as "nothing there".
fn absent_as_empty<T>(path: &str, result: Result<Vec<T>>) -> Result<Vec<T>> {
    match result {
        Err(err) if err.is_not_found() => {
            debug!(path, "Collection not provisioned on this hub");
            Ok(Vec::new())
        }
        other => other,
    }
}

#[async_trait]
impl HubSource for HubClient {
    async fn list_systems(&self) -> Result<Vec<SystemRecord>> {
        self.fetch_systems().await
    }

    async fn list_system_details(&self) -> Result<Vec<SystemDetailsRecord>> {
        self.fetch_system_details().await
    }

    async fn list_containers(&self, filter: Option<&str>) -> Result<Vec<ContainerRecord>> {
        self.fetch_containers(filter).await
    }

    async fn list_alerts(&self, filter: Option<&str>) -> Result<Vec<AlertRecord>> {
        self.fetch_alerts(filter).await
    }
}
