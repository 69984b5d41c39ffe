//! # Hub client
//!
//! Authenticated, paginated read access to a PocketBase-style monitoring hub.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hubsync_client::HubClient;
//! use hubsync_common::Instance;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let instance = Instance::new("home", "http://localhost:8090", "me@example.com", "password");
//!     let client = HubClient::new(&instance)?;
//!
//!     for system in client.fetch_systems().await? {
//!         println!("{}: {}", system.name, system.display_status());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Layers
//!
//! - [`SessionManager`] caches one bearer token per instance and authenticates
//!   lazily, either with a password login or by refreshing a stored token.
//! - [`PagedFetcher`] decodes page envelopes, walks every page of a collection
//!   and retries exactly once after an expired token.
//! - [`HubClient`] applies per-collection policy on top: sorting, optional
//!   collections that may be missing on older hubs, container stat de-duplication.

use std::time::Duration;

use hubsync_common::HubError;
use reqwest::Url;

mod client;
mod paging;
mod session;

pub use client::{system_filter, HubClient};
pub use paging::{PageQuery, PagedFetcher};
pub use session::SessionManager;

pub const DEFAULT_PAGE_SIZE: u32 = 500;

pub mod paths {
    pub const AUTH_WITH_PASSWORD: &str = "/api/collections/users/auth-with-password";
    pub const AUTH_REFRESH: &str = "/api/collections/users/auth-refresh";
    pub const SYSTEMS: &str = "/api/collections/systems/records";
    pub const SYSTEM_DETAILS: &str = "/api/collections/system_details/records";
    pub const SYSTEM_STATS: &str = "/api/collections/system_stats/records";
    pub const CONTAINERS: &str = "/api/collections/containers/records";
    pub const CONTAINER_STATS: &str = "/api/collections/container_stats/records";
    pub const ALERTS: &str = "/api/collections/alerts/records";
}

/// Transport settings shared by every request a client makes.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub page_size: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientOptions {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub(crate) fn build_http_client(&self) -> Result<reqwest::Client, HubError> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| HubError::Network(format!("failed to build HTTP client: {e}")))
    }
}

/// Timeouts and connection failures are both network errors.
pub(crate) fn transport_error(err: reqwest::Error) -> HubError {
    if err.is_decode() {
        HubError::Decode(err.to_string())
    } else if err.is_builder() {
        HubError::BadUrl(err.to_string())
    } else {
        HubError::Network(err.to_string())
    }
}

/// Validates that `base` is an absolute http(s) URL.
pub(crate) fn parse_base_url(base: &str) -> Result<Url, HubError> {
    let url = Url::parse(base).map_err(|e| HubError::BadUrl(format!("{base}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(HubError::BadUrl(format!("{base}: expected an http(s) URL"))),
    }
}

/// Rejects base URLs a client could never be built from.
pub fn validate_base_url(base: &str) -> Result<(), HubError> {
    parse_base_url(base).map(drop)
}

/// Joins a fixed API path onto the base URL, keeping any path prefix the hub is served under.
pub(crate) fn endpoint_url(
    base: &str,
    path: &str,
    query: &[(&str, String)],
) -> Result<Url, HubError> {
    let joined = format!("{}{}", base.trim_end_matches('/'), path);
    let mut url = parse_base_url(&joined)?;
    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_keeps_prefix_and_encodes_query() {
        let url = endpoint_url(
            "https://example.com/beszel/",
            paths::CONTAINERS,
            &[
                ("perPage", "500".to_string()),
                ("filter", "system = 'abc'".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(url.path(), "/beszel/api/collections/containers/records");
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("perPage".to_string(), "500".to_string()),
                ("filter".to_string(), "system = 'abc'".to_string()),
            ]
        );
    }

    #[test]
    fn test_bad_base_urls() {
        assert!(matches!(
            endpoint_url("not a url", paths::SYSTEMS, &[]),
            Err(HubError::BadUrl(_))
        ));
        assert!(matches!(
            endpoint_url("ftp://hub.local", paths::SYSTEMS, &[]),
            Err(HubError::BadUrl(_))
        ));
        assert!(matches!(
            parse_base_url("localhost:8090"),
            Err(HubError::BadUrl(_))
        ));
        assert!(validate_base_url("https://hub.example.com/beszel").is_ok());
        assert!(matches!(
            validate_base_url("not a url"),
            Err(HubError::BadUrl(_))
        ));
    }

    #[test]
    fn test_page_size_floor() {
        assert_eq!(ClientOptions::default().with_page_size(0).page_size, 1);
        assert_eq!(ClientOptions::default().page_size, DEFAULT_PAGE_SIZE);
    }
}
