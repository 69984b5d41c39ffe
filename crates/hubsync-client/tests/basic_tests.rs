//! Basic unit tests for the hub client surface

use hubsync_client::*;
use hubsync_common::{HubError, Instance};
use std::time::Duration;

#[test]
fn test_client_options_defaults() {
    let options = ClientOptions::default();
    assert_eq!(options.connect_timeout, Duration::from_secs(15));
    assert_eq!(options.request_timeout, Duration::from_secs(30));
    assert_eq!(options.page_size, 500);

    let tuned = options
        .with_connect_timeout(Duration::from_secs(2))
        .with_request_timeout(Duration::from_secs(4))
        .with_page_size(50);
    assert_eq!(tuned.connect_timeout, Duration::from_secs(2));
    assert_eq!(tuned.request_timeout, Duration::from_secs(4));
    assert_eq!(tuned.page_size, 50);
}

#[test]
fn test_client_creation() {
    let instance = Instance::new("home", "http://localhost:8090", "me@example.com", "pw");
    let client = HubClient::new(&instance).unwrap();
    assert_eq!(client.instance_id(), instance.id);
    assert_eq!(client.fetcher().page_size(), DEFAULT_PAGE_SIZE);
}

#[test]
fn test_client_rejects_non_http_url() {
    let instance = Instance::new("home", "ftp://hub.local", "me@example.com", "pw");
    assert!(matches!(HubClient::new(&instance), Err(HubError::BadUrl(_))));
}

#[test]
fn test_page_query_builder() {
    let query = PageQuery::page(3)
        .with_per_page(20)
        .with_filter(Some("enabled = true"))
        .with_sort("-created");
    assert_eq!(query.page, Some(3));
    assert_eq!(query.per_page, Some(20));
    assert_eq!(query.filter, Some("enabled = true"));
    assert_eq!(query.sort, Some("-created"));
}
