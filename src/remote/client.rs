// ABOUTME: HTTP client for the remote diagnostic worker's lifecycle API
// ABOUTME: One request per call, no retries; maps worker failures into RemoteError

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;

use super::models::{ErrorBody, ServerSnapshot, StartRequest, StatusResponse, StopRequest};
use crate::config::JobConfig;
use crate::error::RemoteError;

/// The three operations the worker exposes. Implementations hold no job
/// state; deciding what a failure means is left to the caller.
#[async_trait]
pub trait LifecycleApi: Send + Sync {
    async fn start(&self, config: &JobConfig) -> Result<(), RemoteError>;

    async fn stop(&self, target: &str) -> Result<(), RemoteError>;

    async fn list_status(&self) -> Result<ServerSnapshot, RemoteError>;
}

pub struct RemoteClient {
    client: Client,
    api_base_url: String,
}

impl RemoteClient {
    pub fn new(api_base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.api_base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/", self.api_base_url, path)
    }
}

#[async_trait]
impl LifecycleApi for RemoteClient {
    async fn start(&self, config: &JobConfig) -> Result<(), RemoteError> {
        let url = self.endpoint("start");

        let response = self
            .client
            .post(&url)
            .json(&StartRequest::from(config))
            .send()
            .await
            .map_err(|e| transport_error("Failed to submit job to diagnostic worker", e))?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn stop(&self, target: &str) -> Result<(), RemoteError> {
        let url = self.endpoint("stop");

        let response = self
            .client
            .post(&url)
            .json(&StopRequest { target })
            .send()
            .await
            .map_err(|e| transport_error("Failed to send stop request to diagnostic worker", e))?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn list_status(&self) -> Result<ServerSnapshot, RemoteError> {
        let url = self.endpoint("status");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error("Failed to fetch status from diagnostic worker", e))?;

        let response = ensure_success(response).await?;

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| transport_error("Failed to parse status response", e))?;

        Ok(status.into())
    }
}

fn transport_error(context: &str, err: reqwest::Error) -> RemoteError {
    RemoteError::transport(format!("{}: {}", context, err))
}

/// Passes 2xx responses through; anything else becomes a `RemoteError`
/// carrying the worker's `detail` when the body has one.
async fn ensure_success(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message())
        .unwrap_or_else(|| format!("Diagnostic worker responded with status {}", status));

    Err(RemoteError::status(status.as_u16(), message))
}
