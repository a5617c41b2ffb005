use crate::api::backend::BackendClient;
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigObject {
    User,
    Voice,
    Music,
    Agent,
}

impl ConfigObject {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Voice => "voice",
            Self::Music => "music",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for ConfigObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    Get,
    Update,
}

impl ConfigAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Update => "update",
        }
    }
}

/// Genre and agent tier a settings object is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigScope {
    pub genre: String,
    pub agent: String,
}

impl ConfigScope {
    pub fn new(genre: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            genre: genre.into(),
            agent: agent.into(),
        }
    }
}

impl Default for ConfigScope {
    fn default() -> Self {
        Self::new(crate::config::default_genre(), crate::config::default_agent())
    }
}

/// Answer of the `config` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[async_trait]
pub trait ConfigStoreApi: Send + Sync {
    async fn config_call(
        &self,
        object: ConfigObject,
        action: ConfigAction,
        scope: &ConfigScope,
        body: Value,
    ) -> Result<ConfigResponse, ApiError>;
}

#[async_trait]
impl ConfigStoreApi for BackendClient {
    async fn config_call(
        &self,
        object: ConfigObject,
        action: ConfigAction,
        scope: &ConfigScope,
        body: Value,
    ) -> Result<ConfigResponse, ApiError> {
        let body = if body.is_null() { json!({}) } else { body };
        let resp = self
            .http()
            .post(self.endpoint_url("config"))
            .query(&[
                ("object", object.as_str()),
                ("action", action.as_str()),
                ("genre", scope.genre.as_str()),
                ("agent", scope.agent.as_str()),
            ])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail: None,
            });
        }

        let raw = resp.text().await?;
        Ok(serde_json::from_str(&raw)?)
    }
}
