//! API probe client
//!
//! Calls every serving endpoint once and collects the responses into a single
//! JSON document. Error responses are recorded, not raised; only a transport
//! failure stops the probe.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
/// Test data file the probe asks predictions for
pub const DEFAULT_PREDICTION_FILE: &str = "testdata.csv";

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Probe client errors
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

/// One endpoint's response
#[derive(Debug, Clone, Serialize)]
pub struct EndpointReturn {
    pub status: u16,
    /// Parsed JSON, or the raw text when the body is not JSON
    pub body: Value,
}

impl EndpointReturn {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Combined responses of all endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ApiReturns {
    pub prediction: EndpointReturn,
    pub scoring: EndpointReturn,
    pub summarystats: EndpointReturn,
    pub diagnostics: EndpointReturn,
}

impl ApiReturns {
    pub fn all_succeeded(&self) -> bool {
        [&self.prediction, &self.scoring, &self.summarystats, &self.diagnostics]
            .iter()
            .all(|r| r.is_success())
    }
}

/// HTTP client for the serving API
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProbeError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn prediction(&self, file_path: &str) -> Result<EndpointReturn, ProbeError> {
        let request = self
            .http_client
            .post(format!("{}/prediction", self.base_url))
            .query(&[("file_path", file_path)]);
        self.send("prediction", request).await
    }

    pub async fn scoring(&self) -> Result<EndpointReturn, ProbeError> {
        self.get("scoring").await
    }

    pub async fn summary_stats(&self) -> Result<EndpointReturn, ProbeError> {
        self.get("summarystats").await
    }

    pub async fn diagnostics(&self) -> Result<EndpointReturn, ProbeError> {
        self.get("diagnostics").await
    }

    /// Call every endpoint in turn
    pub async fn probe(&self, prediction_file: &str) -> Result<ApiReturns, ProbeError> {
        let returns = ApiReturns {
            prediction: self.prediction(prediction_file).await?,
            scoring: self.scoring().await?,
            summarystats: self.summary_stats().await?,
            diagnostics: self.diagnostics().await?,
        };
        tracing::info!(
            base_url = %self.base_url,
            all_succeeded = returns.all_succeeded(),
            "Probed serving API"
        );
        Ok(returns)
    }

    async fn get(&self, endpoint: &str) -> Result<EndpointReturn, ProbeError> {
        let request = self.http_client.get(format!("{}/{}", self.base_url, endpoint));
        self.send(endpoint, request).await
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<EndpointReturn, ProbeError> {
        tracing::debug!(endpoint, "Calling serving API");

        let response = request
            .send()
            .await
            .map_err(|e| ProbeError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ProbeError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        if !(200..300).contains(&status) {
            tracing::warn!(endpoint, status, "Serving API returned an error");
        }
        Ok(EndpointReturn { status, body })
    }
}
