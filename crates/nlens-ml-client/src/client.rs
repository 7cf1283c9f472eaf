//! Detection service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use nlens_models::Detection;

use crate::error::{MlError, MlResult};
use crate::types::{DetectionRequest, DetectionResponse, ModelStatusResponse};

const DEFAULT_ENDPOINT: &str = "http://localhost:8501/v1/models/holoselecta:predict";

/// Anything that can turn an encoded request into detections.
///
/// The pipeline only depends on this trait so tests can stand in a fake
/// service without a socket.
#[async_trait]
pub trait DetectionService: Send + Sync {
    async fn detect(&self, request: DetectionRequest) -> MlResult<Vec<Detection>>;
}

/// Configuration for the detection client.
#[derive(Debug, Clone)]
pub struct DetectionClientConfig {
    /// Full prediction URL (TensorFlow Serving style `.../models/<name>:predict`)
    pub endpoint: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for transient transport errors
    pub max_retries: u32,
}

impl Default for DetectionClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 0, // the pipeline's cooldown handles failures
        }
    }
}

impl DetectionClientConfig {
    /// Model status URL: the prediction endpoint without its `:predict` verb.
    pub fn status_url(&self) -> &str {
        self.endpoint
            .strip_suffix(":predict")
            .unwrap_or(&self.endpoint)
    }
}

/// Client for the remote object-detection service.
pub struct DetectionClient {
    http: Client,
    config: DetectionClientConfig,
}

impl DetectionClient {
    /// Create a new detection client.
    pub fn new(config: DetectionClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Check whether the served model reports an available version.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = self.config.status_url();

        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                let status: ModelStatusResponse = response.json().await?;
                Ok(status
                    .model_version_status
                    .iter()
                    .any(|v| v.state.eq_ignore_ascii_case("available")))
            }
            Ok(response) => {
                warn!("Detection service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Detection service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Send one request and parse the detections of its single batch entry.
    pub async fn predict(&self, request: &DetectionRequest) -> MlResult<Vec<Detection>> {
        let url = &self.config.endpoint;

        debug!(
            payload_bytes = request.payload_len(),
            "Sending detection request to {}", url
        );

        let response = self
            .with_retry(|| async move {
                let response = self
                    .http
                    .post(url)
                    .json(request)
                    .send()
                    .await
                    .map_err(|e| self.map_send_error(e))?;

                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(MlError::from_http_status(status, &body));
                }

                Ok(response)
            })
            .await?;

        let body = response.text().await?;
        let parsed: DetectionResponse = serde_json::from_str(&body)?;
        parsed.into_detections()
    }

    fn map_send_error(&self, e: reqwest::Error) -> MlError {
        if e.is_timeout() {
            MlError::Timeout(self.config.timeout.as_secs())
        } else {
            MlError::Network(e)
        }
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(100 * 2u64.pow(attempt));
                    warn!(
                        "Detection request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(MlError::RequestFailed("Unknown error".to_string())))
    }
}

#[async_trait]
impl DetectionService for DetectionClient {
    async fn detect(&self, request: DetectionRequest) -> MlResult<Vec<Detection>> {
        self.predict(&request).await
    }
}
