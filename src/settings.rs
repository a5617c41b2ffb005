use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::api::{ConfigAction, ConfigObject, ConfigScope, ConfigStoreApi};
use crate::error::SettingsError;
use crate::{logi, logw};

/// The backend sends `null` for fields it has never stored.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_used_mothership: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_used_prompt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_used_genre: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub voice_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub speed: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pitch: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicSettings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub volume: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub system_prompt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_used_mothership: String,
}

/// Server-backed settings with a local seed cache.
///
/// The backend is the source of truth. The cache file only ever receives
/// values the server returned and is read only when the server is
/// unreachable.
pub struct SettingsStore<S> {
    api: S,
    scope: ConfigScope,
    cache_path: PathBuf,
}

impl<S: ConfigStoreApi> SettingsStore<S> {
    pub fn new(api: S, scope: ConfigScope, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            api,
            scope,
            cache_path: cache_path.into(),
        }
    }

    pub fn scope(&self) -> &ConfigScope {
        &self.scope
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Current value of `object`: network first, cached seed as fallback.
    pub async fn current(&self, object: ConfigObject) -> Result<Value, SettingsError> {
        match self.fetch_remote(object).await {
            Ok(value) => {
                if let Err(err) = self.store_cached(object, &value).await {
                    logw(format!("Could not refresh settings cache: {}", err));
                }
                Ok(value)
            }
            Err(err) => match self.cached(object).await {
                Ok(Some(seed)) => {
                    logw(format!("{} settings unavailable ({}), using cached copy", object, err));
                    Ok(seed)
                }
                Ok(None) => Err(err),
                Err(cache_err) => {
                    logw(format!("Settings cache unusable: {}", cache_err));
                    Err(err)
                }
            },
        }
    }

    /// Send `patch` to the server, then cache what the server reports back.
    pub async fn update(&self, object: ConfigObject, patch: Value) -> Result<Value, SettingsError> {
        let resp = self
            .api
            .config_call(object, ConfigAction::Update, &self.scope, patch)
            .await?;
        if !resp.success {
            return Err(SettingsError::Rejected {
                object: object.to_string(),
                message: resp.message.unwrap_or_else(|| "update failed".to_string()),
            });
        }

        let confirmed = self.fetch_remote(object).await?;
        self.store_cached(object, &confirmed).await?;
        logi(format!("Updated {} settings", object));
        Ok(confirmed)
    }

    pub async fn user(&self) -> Result<UserSettings, SettingsError> {
        self.typed(ConfigObject::User).await
    }

    pub async fn voice(&self) -> Result<VoiceSettings, SettingsError> {
        self.typed(ConfigObject::Voice).await
    }

    pub async fn music(&self) -> Result<MusicSettings, SettingsError> {
        self.typed(ConfigObject::Music).await
    }

    pub async fn agent(&self) -> Result<AgentSettings, SettingsError> {
        self.typed(ConfigObject::Agent).await
    }

    /// Remember the inputs of a run as the user's last used values.
    pub async fn save_last_used(
        &self,
        mothership: &str,
        prompt: &str,
        genre: &str,
    ) -> Result<UserSettings, SettingsError> {
        let patch = json!({
            "last_used_mothership": mothership,
            "last_used_prompt": prompt,
            "last_used_genre": genre,
        });
        let value = self.update(ConfigObject::User, patch).await?;
        decode(ConfigObject::User, value)
    }

    async fn typed<T: DeserializeOwned>(&self, object: ConfigObject) -> Result<T, SettingsError> {
        let value = self.current(object).await?;
        decode(object, value)
    }

    async fn fetch_remote(&self, object: ConfigObject) -> Result<Value, SettingsError> {
        let resp = self
            .api
            .config_call(object, ConfigAction::Get, &self.scope, json!({}))
            .await?;
        if !resp.success {
            return Err(SettingsError::Rejected {
                object: object.to_string(),
                message: resp.message.unwrap_or_else(|| "fetch failed".to_string()),
            });
        }
        // A scope the backend has never stored comes back as `null`.
        Ok(match resp.data {
            Value::Null => json!({}),
            data => data,
        })
    }

    fn cache_key(&self, object: ConfigObject) -> String {
        format!("{}/{}/{}", object, self.scope.genre, self.scope.agent)
    }

    fn cache_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Cache {
            path: self.cache_path.display().to_string(),
            source,
        }
    }

    /// Read the cache file. A file that is not a JSON object is discarded
    /// with a warning and rebuilt on the next write; I/O failures other than
    /// a missing file are errors.
    async fn read_cache(&self) -> Result<Map<String, Value>, SettingsError> {
        let text = match fs::read_to_string(&self.cache_path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(self.cache_error(err)),
        };
        match serde_json::from_str(&text) {
            Ok(cache) => Ok(cache),
            Err(err) => {
                logw(format!(
                    "Ignoring corrupt settings cache {}: {}",
                    self.cache_path.display(),
                    err
                ));
                Ok(Map::new())
            }
        }
    }

    async fn cached(&self, object: ConfigObject) -> Result<Option<Value>, SettingsError> {
        let mut cache = self.read_cache().await?;
        Ok(cache.remove(&self.cache_key(object)))
    }

    async fn store_cached(&self, object: ConfigObject, value: &Value) -> Result<(), SettingsError> {
        let mut cache = self.read_cache().await?;
        cache.insert(self.cache_key(object), value.clone());

        if let Some(parent) = self.cache_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.cache_error(e))?;
            }
        }
        let text =
            serde_json::to_string_pretty(&Value::Object(cache)).map_err(SettingsError::CacheFormat)?;
        fs::write(&self.cache_path, text)
            .await
            .map_err(|e| self.cache_error(e))
    }
}

fn decode<T: DeserializeOwned>(object: ConfigObject, value: Value) -> Result<T, SettingsError> {
    serde_json::from_value(value).map_err(|source| SettingsError::Payload {
        object: object.to_string(),
        source,
    })
}
