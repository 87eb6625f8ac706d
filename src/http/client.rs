//! HTTP transport for remote execution
//!
//! Posts a [`RemoteRunRequest`] as JSON to `{endpoint}/runs` and blocks until
//! the remote executor answers with the results.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::wire::{RemoteRunRequest, RemoteRunResponse};

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Remote executor answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),
}

fn default_request_timeout() -> u64 {
    300
}

/// Address and credentials of a remote executor
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    /// Base URL, e.g. `https://grid.example.com`
    pub endpoint: String,

    /// Sent as a bearer token when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Upper bound for one dispatch round trip
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl RemoteTarget {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// URL the run request is posted to
    pub fn runs_url(&self) -> Result<String, TransportError> {
        let base = self.endpoint.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(TransportError::InvalidUrl(self.endpoint.clone()));
        }
        Ok(format!("{}/runs", base.trim_end_matches('/')))
    }
}

impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTarget")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Carries a run request to a remote executor and returns its answer
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn dispatch(
        &self,
        target: &RemoteTarget,
        request: &RemoteRunRequest,
    ) -> Result<RemoteRunResponse, TransportError>;
}

/// reqwest-backed JSON transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn dispatch(
        &self,
        target: &RemoteTarget,
        request: &RemoteRunRequest,
    ) -> Result<RemoteRunResponse, TransportError> {
        let url = target.runs_url()?;
        debug!("Dispatching {} units to {}", request.units.len(), url);

        let mut req_builder = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(target.request_timeout_secs))
            .json(request);

        if let Some(key) = &target.api_key {
            req_builder = req_builder.bearer_auth(key);
        }

        let start = std::time::Instant::now();

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(target.request_timeout_secs)
            } else if e.is_connect() {
                TransportError::ConnectionRefused(url.clone())
            } else {
                TransportError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<RemoteRunResponse>()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_url() {
        let target = RemoteTarget::new("https://grid.example.com/");
        assert_eq!(target.runs_url().unwrap(), "https://grid.example.com/runs");
    }

    #[test]
    fn test_runs_url_rejects_missing_scheme() {
        let target = RemoteTarget::new("grid.example.com");
        assert!(matches!(
            target.runs_url(),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let target = RemoteTarget::new("http://10.0.0.1:8080").with_api_key("s3cret");
        let debug = format!("{target:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_target_from_yaml_defaults() {
        let target: RemoteTarget = serde_yaml::from_str("endpoint: http://localhost:9000").unwrap();
        assert_eq!(target.request_timeout_secs, 300);
        assert!(target.api_key.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_invalid_url_fails_fast() {
        let transport = HttpTransport::new().unwrap();
        let request = RemoteRunRequest {
            run_id: "r1".to_string(),
            units: Vec::new(),
            timeout_ms: None,
        };
        let err = transport
            .dispatch(&RemoteTarget::new("ftp://nowhere"), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }
}
