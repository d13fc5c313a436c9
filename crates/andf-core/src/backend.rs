use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::error::BackendError;

/// Opaque citation returned by the service. Its shape is the backend's business.
pub type SourceRef = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub max_results: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// `null` and a missing field both mean "no sources"
    #[serde(default)]
    pub sources: Option<Vec<SourceRef>>,
}

/// The answering service as seen by the session
#[async_trait]
pub trait Backend: Send + Sync {
    /// Reachability check. `Ok` only for a 2xx response.
    async fn health(&self) -> Result<(), BackendError>;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError>;

    /// Human-readable location, used in error hints
    fn describe(&self) -> String;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn health(&self) -> Result<(), BackendError> {
        let url = format!("{}/health", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        let url = format!("{}/chat", self.base_url);

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str::<ChatReply>(&body)
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
