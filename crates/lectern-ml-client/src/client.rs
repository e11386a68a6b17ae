//! ML service HTTP client.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use lectern_models::{FrameRef, TranscriptSegment};

use crate::error::{MlError, MlResult};
use crate::types::{
    EmbedRequest, EmbedResponse, HealthResponse, SummarizeRequest, SummarizeResponse,
    TranscribeRequest, TranscribeResponse,
};

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(300), // long windows take minutes to transcribe
        }
    }
}

impl MlClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Create config from environment variables.
    ///
    /// Returns `None` when `ML_SERVICE_URL` is unset or empty.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("ML_SERVICE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())?;
        Some(Self {
            timeout: Duration::from_secs(
                std::env::var("ML_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            ..Self::new(base_url)
        })
    }
}

/// Client for the ML service. Requests are not retried.
#[derive(Debug, Clone)]
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables, if the service is configured.
    pub fn from_env() -> MlResult<Option<Self>> {
        MlClientConfig::from_env().map(Self::new).transpose()
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check if ML service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Transcribe `[t_start, t_end)` of the source file.
    pub async fn transcribe(
        &self,
        source_path: &str,
        t_start: f64,
        t_end: f64,
    ) -> MlResult<Vec<TranscriptSegment>> {
        let request = TranscribeRequest {
            source_path: source_path.to_string(),
            t_start,
            t_end,
        };
        let response: TranscribeResponse = self.post_json("/transcribe", &request).await?;
        Ok(response.segments)
    }

    /// Summarize one window.
    pub async fn summarize(
        &self,
        window_index: u32,
        t_start: f64,
        t_end: f64,
        transcript: Vec<TranscriptSegment>,
        frames: Vec<FrameRef>,
    ) -> MlResult<String> {
        let request = SummarizeRequest {
            window_index,
            t_start,
            t_end,
            transcript,
            frames,
        };
        let response: SummarizeResponse = self.post_json("/summarize", &request).await?;
        Ok(response.summary)
    }

    /// Embed texts; one vector per input, in order.
    pub async fn embed(&self, texts: Vec<String>) -> MlResult<Vec<Vec<f32>>> {
        let expected = texts.len();
        let response: EmbedResponse = self.post_json("/embed", &EmbedRequest { texts }).await?;
        if response.embeddings.len() != expected {
            return Err(MlError::invalid_response(format!(
                "expected {} embeddings, got {}",
                expected,
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> MlResult<Vec<f32>> {
        let mut embeddings = self.embed(vec![text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| MlError::invalid_response("empty embeddings"))
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> MlResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("POST {}", url);

        let response = self.http.post(&url).json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                MlError::Timeout(self.config.timeout.as_secs())
            } else {
                MlError::Network(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::request_failed(format!(
                "ML service returned {}: {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| MlError::invalid_response(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MlClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        assert_eq!(MlClientConfig::new("http://ml:9000/").base_url, "http://ml:9000");
    }
}
