use crate::config::Config;
use crate::error::ApiError;
use crate::logw;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope every pipeline call resolves to.
///
/// `data` holds the backend's whole JSON body; `videoUrl` is lifted from it
/// to the top level when the backend sends one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(rename = "videoUrl", default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

impl StepResponse {
    /// Wrap a successfully received (2xx) backend body.
    ///
    /// A body without a `success` flag counts as success.
    pub fn from_body(body: Value) -> Self {
        let success = body.get("success").and_then(Value::as_bool).unwrap_or(true);
        let error = body.get("error").and_then(Value::as_str).map(str::to_string);
        let message = body.get("message").and_then(Value::as_str).map(str::to_string);
        let video_url = body
            .get("videoUrl")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Self {
            success,
            message,
            error,
            data: Some(body),
            video_url,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Server-supplied reason for a `success: false` answer.
    pub fn failure_reason(&self) -> String {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown error")
            .to_string()
    }
}

/// Transport seam between the orchestrator and the generation backend.
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// POST `body` to the pipeline endpoint named `endpoint`.
    async fn post_step(&self, endpoint: &str, body: Value) -> Result<StepResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(cfg.request_timeout())
            .connect_timeout(cfg.connect_timeout())
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self::with_client(client, &cfg.api_base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl GenerationApi for BackendClient {
    async fn post_step(&self, endpoint: &str, body: Value) -> Result<StepResponse, ApiError> {
        let url = self.endpoint_url(endpoint);
        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        let raw = resp.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&raw).ok().and_then(|v| {
                v.get("error").and_then(Value::as_str).map(str::to_string)
            });
            logw(format!("{} answered HTTP {}", endpoint, status.as_u16()));
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed: Value = serde_json::from_str(&raw)?;
        if !parsed.is_object() {
            return Err(ApiError::Other(format!(
                "{endpoint} returned a non-object JSON body"
            )));
        }
        Ok(StepResponse::from_body(parsed))
    }
}
