//! Backend HTTP endpoints: credential fetch, session refresh, episode reset.
//!
//! Every call here is single-attempt or fire-and-forget; resilience lives in
//! the transport-level reconnect loop, not in per-call retries.

use anyhow::{Context, Result};
use async_trait::async_trait;

use easeview_protocol::Credential;

use crate::config::ClientConfig;

/// Backend web API capability.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// GET a one-time websocket credential for the current login session.
    async fn fetch_credential(&self) -> Result<Credential>;

    /// Keep-alive GET refreshing the backend-side session.
    async fn refresh_session(&self) -> Result<()>;

    /// Fire-and-forget POST rebuilding the backend working set for the
    /// selected episode.
    async fn request_reset(&self) -> Result<()>;
}

/// `reqwest`-backed backend API.
pub struct HttpBackendApi {
    http: reqwest::Client,
    auth_url: String,
    refresh_url: String,
    reset_url: String,
}

impl HttpBackendApi {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_url: config.auth_url.clone(),
            refresh_url: config.refresh_url.clone(),
            reset_url: config.reset_url.clone(),
        }
    }
}

#[async_trait]
impl BackendApi for HttpBackendApi {
    async fn fetch_credential(&self) -> Result<Credential> {
        let response = self
            .http
            .get(&self.auth_url)
            .send()
            .await
            .context("Failed to reach auth endpoint")?
            .error_for_status()
            .context("Auth endpoint rejected the session")?;

        // An unauthenticated session gets `{"error": ...}` back; that fails
        // deserialization here and surfaces as a credential-fetch error.
        response
            .json::<Credential>()
            .await
            .context("Auth endpoint returned no credential")
    }

    async fn refresh_session(&self) -> Result<()> {
        self.http
            .get(&self.refresh_url)
            .send()
            .await
            .context("Failed to reach refresh endpoint")?
            .error_for_status()
            .context("Session refresh rejected")?;
        Ok(())
    }

    async fn request_reset(&self) -> Result<()> {
        self.http
            .post(&self.reset_url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("Failed to reach reset endpoint")?
            .error_for_status()
            .context("Backend reset rejected")?;
        Ok(())
    }
}
