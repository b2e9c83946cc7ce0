//! HTTP client for the cloud backend's gateway endpoints.

use std::time::Duration;

use {async_trait::async_trait, reqwest::StatusCode, tracing::debug};

use clawden_tenancy::{TokenVerifier, VerifiedToken};

use crate::{
    error::{Error, Result},
    sync::ConfigFetcher,
    types::{ConfigPage, VerifyResponse},
};

/// Per-call budget for token verification; an authenticator must never wait
/// longer than this on upstream.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-call budget for a config page fetch.
const SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the cloud backend. Cheap to clone; the underlying connection
/// pool is shared.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
    service_token: String,
}

impl CloudClient {
    pub fn new(base_url: impl Into<String>, service_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_token: service_token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /auth/verify-token?token=…`.
    ///
    /// 2xx → the verified record, 401 → `None` (invalid token), anything
    /// else is a transport failure.
    pub async fn verify_token(&self, token: &str) -> Result<Option<VerifiedToken>> {
        let url = format!("{}/auth/verify-token", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("token", token)])
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body: VerifyResponse = response.json().await?;
                debug!(user_id = %body.data.user_id, "token verified upstream");
                Ok(Some(VerifiedToken {
                    user_id: body.data.user_id,
                    status: body.data.status,
                    config: body.data.openclaw_config,
                }))
            },
            StatusCode::UNAUTHORIZED => Ok(None),
            status => Err(Error::Status {
                status: status.as_u16(),
                endpoint: "/auth/verify-token".into(),
            }),
        }
    }

    /// `GET /gateway/configs?since=…[&cursor=…]` with the service bearer.
    pub async fn fetch_configs(
        &self,
        since: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<ConfigPage> {
        let url = format!("{}/gateway/configs", self.base_url);
        let mut request = self
            .http
            .get(&url)
            .bearer_auth(&self.service_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(SYNC_TIMEOUT);
        if let Some(since) = since {
            request = request.query(&[("since", since)]);
        }
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                endpoint: "/gateway/configs".into(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TokenVerifier for CloudClient {
    async fn verify_token(&self, token: &str) -> clawden_tenancy::Result<Option<VerifiedToken>> {
        CloudClient::verify_token(self, token)
            .await
            .map_err(|e| clawden_tenancy::Error::Upstream(e.to_string()))
    }
}

#[async_trait]
impl ConfigFetcher for CloudClient {
    async fn fetch_page(&self, since: Option<&str>, cursor: Option<&str>) -> Result<ConfigPage> {
        self.fetch_configs(since, cursor).await
    }
}
