use hubsync_common::{AuthResponse, CredentialKind, HubError, Instance, Result};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{endpoint_url, paths, transport_error};

/// Owns the cached bearer token for one hub instance.
///
/// The token slot is an async mutex held for the whole authentication
/// exchange, so concurrent callers that find no cached token queue behind a
/// single login/refresh call and then read its result.
pub struct SessionManager {
    http: Client,
    instance_id: Uuid,
    base_url: String,
    email: String,
    credential: String,
    token: Mutex<Option<String>>,
}

impl SessionManager {
    pub fn new(http: Client, instance: &Instance) -> Self {
        Self {
            http,
            instance_id: instance.id,
            base_url: instance.url.clone(),
            email: instance.email.clone(),
            credential: instance.credential.clone(),
            token: Mutex::new(None),
        }
    }

    /// Returns the cached token, authenticating first if there is none.
    #[instrument(skip(self), fields(instance = %self.instance_id))]
    pub async fn get_valid_token(&self) -> Result<String> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }

        let token = match CredentialKind::of(&self.credential) {
            CredentialKind::Empty => return Err(HubError::AuthenticationRequired),
            CredentialKind::Token => self.refresh_token(&self.credential).await?,
            CredentialKind::Password => self.login_with_password().await?,
        };

        *slot = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token; the next call re-authenticates.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    /// Drops the cached token only if it is still `stale`, so a token that a
    /// concurrent caller already replaced survives.
    pub(crate) async fn invalidate_token(&self, stale: &str) {
        let mut slot = self.token.lock().await;
        if slot.as_deref() == Some(stale) {
            debug!(instance = %self.instance_id, "Invalidating rejected token");
            *slot = None;
        }
    }

    pub async fn cached_token(&self) -> Option<String> {
        self.token.lock().await.clone()
    }

    async fn login_with_password(&self) -> Result<String> {
        let url = endpoint_url(&self.base_url, paths::AUTH_WITH_PASSWORD, &[])?;
        info!(instance = %self.instance_id, "Authenticating with password");

        let response = self
            .http
            .post(url)
            .json(&json!({
                "identity": self.email,
                "password": self.credential,
            }))
            .send()
            .await
            .map_err(transport_error)?;

        Self::read_token(response).await
    }

    async fn refresh_token(&self, current: &str) -> Result<String> {
        let url = endpoint_url(&self.base_url, paths::AUTH_REFRESH, &[])?;
        info!(instance = %self.instance_id, "Refreshing stored token");

        let response = self
            .http
            .post(url)
            .bearer_auth(current)
            .send()
            .await
            .map_err(transport_error)?;

        Self::read_token(response).await
    }

    async fn read_token(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "Authentication rejected");
            return Err(HubError::AuthenticationFailed {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport_error)?;
        let auth: AuthResponse =
            serde_json::from_slice(&body).map_err(|e| HubError::Decode(e.to_string()))?;
        Ok(auth.token)
    }
}
