//! HTTP implementation of the [`ScanBackend`] port.

use super::types::{CancelAck, ScanRequest, ScanResponse, ScanStatusSnapshot};
use super::ScanBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Per-request timeout; status polls are small payloads and should be fast.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body shape the backend uses for 4xx/5xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Build a backend client against the given API base URL,
    /// e.g. "http://127.0.0.1:8000/api".
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Read an error body and map it to a `Backend` error, falling back
    /// to the bare status code when the body is unreadable.
    async fn backend_error(resp: reqwest::Response) -> Error {
        let status = resp.status();
        let detail = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.detail)
            .unwrap_or_else(|| format!("server returned {}", status));
        tracing::debug!("Backend error response ({}): {}", status, detail);
        Error::Backend(detail)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::backend_error(resp).await);
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::Backend(format!("malformed response body: {}", e)))
    }
}

#[async_trait]
impl ScanBackend for HttpBackend {
    async fn start_scan(&self, request: &ScanRequest) -> Result<ScanResponse> {
        let url = format!("{}/scan", self.base_url);
        tracing::info!(
            "Starting {} scan of {} via {}",
            request.scan_type,
            request.target,
            url
        );

        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::backend_error(resp).await);
        }

        resp.json::<ScanResponse>()
            .await
            .map_err(|e| Error::Backend(format!("malformed scan response: {}", e)))
    }

    async fn scan_status(&self, scan_id: &str) -> Result<ScanStatusSnapshot> {
        self.get_json(format!("{}/scan/{}/status", self.base_url, scan_id))
            .await
    }

    async fn scan_result(&self, scan_id: &str) -> Result<ScanResponse> {
        self.get_json(format!("{}/scan/{}", self.base_url, scan_id))
            .await
    }

    async fn cancel_scan(&self, scan_id: &str) -> Result<CancelAck> {
        let url = format!("{}/scan/{}/cancel", self.base_url, scan_id);

        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::backend_error(resp).await);
        }

        resp.json::<CancelAck>()
            .await
            .map_err(|e| Error::Backend(format!("malformed cancel response: {}", e)))
    }
}
