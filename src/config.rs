use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::logi;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Origin prepended to server-relative video paths. Falls back to the
    /// origin of `api_base_url`.
    #[serde(default)]
    pub public_origin: Option<String>,
    #[serde(default = "default_genre")]
    pub default_genre: String,
    #[serde(default = "default_agent")]
    pub default_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_progress_tick_ms")]
    pub progress_tick_ms: u64,
    #[serde(default = "default_progress_tick_increment")]
    pub progress_tick_increment: f64,
    #[serde(default = "default_settings_cache_path")]
    pub settings_cache_path: PathBuf,
}

fn default_api_base_url() -> String {
    "http://0.0.0.0:8000/api".to_string()
}

pub fn default_genre() -> String {
    "military".to_string()
}

pub fn default_agent() -> String {
    "medium".to_string()
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_progress_tick_ms() -> u64 {
    100
}

fn default_progress_tick_increment() -> f64 {
    0.5
}

fn default_settings_cache_path() -> PathBuf {
    PathBuf::from("cache/settings.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            public_origin: None,
            default_genre: default_genre(),
            default_agent: default_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            progress_tick_ms: default_progress_tick_ms(),
            progress_tick_increment: default_progress_tick_increment(),
            settings_cache_path: default_settings_cache_path(),
        }
    }
}

impl Config {
    /// Load `path`, or fall back to defaults when the file does not exist.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                logi(format!("{} not found, using defaults", path.display()));
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read config: {}", path.display()));
            }
        };
        Self::from_json(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            anyhow::bail!("config.json: api_base_url missing");
        }
        Url::parse(&self.api_base_url)
            .with_context(|| format!("config.json: api_base_url is not a URL: {}", self.api_base_url))?;
        if self.progress_tick_ms == 0 {
            anyhow::bail!("config.json: progress_tick_ms must be positive");
        }
        if self.progress_tick_increment.is_nan() || self.progress_tick_increment <= 0.0 {
            anyhow::bail!("config.json: progress_tick_increment must be positive");
        }
        Ok(())
    }

    /// Scheme, host and port used to absolutise relative video paths.
    pub fn origin(&self) -> Result<String> {
        let source = self
            .public_origin
            .as_deref()
            .filter(|o| !o.trim().is_empty())
            .unwrap_or(&self.api_base_url);
        let url = Url::parse(source).with_context(|| format!("not a URL: {source}"))?;
        Ok(url.origin().ascii_serialization())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.api_base_url, "http://0.0.0.0:8000/api");
        assert_eq!(cfg.default_genre, "military");
        assert_eq!(cfg.default_agent, "medium");
        assert_eq!(cfg.progress_tick(), Duration::from_millis(100));
        assert_eq!(cfg.progress_tick_increment, 0.5);
    }

    #[test]
    fn origin_prefers_public_origin() {
        let cfg = Config::from_json(
            r#"{"api_base_url":"http://10.0.0.2:8000/api","public_origin":"https://app.test/dashboard"}"#,
        )
        .unwrap();
        assert_eq!(cfg.origin().unwrap(), "https://app.test");
    }

    #[test]
    fn origin_falls_back_to_api_base() {
        let cfg = Config::from_json(r#"{"api_base_url":"http://localhost:8000/api"}"#).unwrap();
        assert_eq!(cfg.origin().unwrap(), "http://localhost:8000");
    }

    #[test]
    fn rejects_blank_base_url_and_zero_tick() {
        assert!(Config::from_json(r#"{"api_base_url":"  "}"#).is_err());
        assert!(Config::from_json(r#"{"progress_tick_ms":0}"#).is_err());
        assert!(Config::from_json(r#"{"api_base_url":"not a url"}"#).is_err());
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(dir.path().join("nope.json")).await.unwrap();
        assert_eq!(cfg.settings_cache_path, PathBuf::from("cache/settings.json"));
    }

    #[tokio::test]
    async fn unreadable_path_is_an_error_not_defaults() {
        let dir = tempfile::tempdir().unwrap();
        // A directory exists but cannot be read as a file.
        assert!(Config::load(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        assert!(Config::load(&path).await.is_err());
    }
}
