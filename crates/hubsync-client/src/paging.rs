use std::sync::Arc;

use hubsync_common::{HubError, PageEnvelope, Result};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{endpoint_url, transport_error, SessionManager};

/// Query parameters for a single page request.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageQuery<'a> {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub filter: Option<&'a str>,
    pub sort: Option<&'a str>,
}

impl<'a> PageQuery<'a> {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: Option<&'a str>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn with_sort(mut self, sort: &'a str) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Authenticated GET + page-envelope decoding for one hub instance.
pub struct PagedFetcher {
    http: Client,
    base_url: String,
    session: Arc<SessionManager>,
    page_size: u32,
}

impl PagedFetcher {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        session: Arc<SessionManager>,
        page_size: u32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            session,
            page_size,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn build_url(&self, path: &str, query: &PageQuery<'_>) -> Result<Url> {
        let mut params = vec![(
            "perPage",
            query.per_page.unwrap_or(self.page_size).to_string(),
        )];
        if let Some(page) = query.page {
            params.push(("page", page.to_string()));
        }
        if let Some(filter) = query.filter {
            params.push(("filter", filter.to_string()));
        }
        if let Some(sort) = query.sort {
            params.push(("sort", sort.to_string()));
        }
        endpoint_url(&self.base_url, path, &params)
    }

    /// Fetches and decodes one page.
    ///
    /// A 401 invalidates the session token and the identical request is sent
    /// once more with a fresh token; a second 401 is returned as an HTTP error.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &PageQuery<'_>,
    ) -> Result<PageEnvelope<T>> {
        let url = self.build_url(path, query)?;
        let mut retried = false;

        loop {
            let token = self.session.get_valid_token().await?;
            let response = self
                .http
                .get(url.clone())
                .bearer_auth(&token)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if status == StatusCode::OK {
                let body = response.bytes().await.map_err(transport_error)?;
                return serde_json::from_slice(&body).map_err(|e| HubError::Decode(e.to_string()));
            }

            if status == StatusCode::UNAUTHORIZED && !retried {
                warn!(%url, "Token rejected, re-authenticating once");
                self.session.invalidate_token(&token).await;
                retried = true;
                continue;
            }

            return Err(HubError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
    }

    /// Walks every page of a collection starting at page 1 and concatenates the items in page order.
    pub async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let envelope: PageEnvelope<T> = self
                .fetch(path, &PageQuery::page(page).with_filter(filter))
                .await?;
            debug!(
                path,
                page,
                total_pages = envelope.total_pages,
                count = envelope.items.len(),
                "Fetched page"
            );
            items.extend(envelope.items);

            page += 1;
            if page > envelope.total_pages {
                break;
            }
        }

        Ok(items)
    }
}
