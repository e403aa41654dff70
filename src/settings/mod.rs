//! Settings Module
//!
//! Holds the remote model endpoint/model/key used by the assistant. Built-in
//! defaults come from [`Config`](crate::config::Config); a persisted override
//! is merged over them field by field. The API key is encrypted at rest using
//! AES-256-GCM.

pub mod routes;
pub mod storage;

pub use routes::router;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::info;

use crate::config::LLMConfig;

/// Effective settings used for every remote call. All fields are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub endpoint: String,
    pub model: String,
    pub key: String,
}

impl From<&LLMConfig> for ApiSettings {
    fn from(config: &LLMConfig) -> Self {
        Self {
            endpoint: config.api_endpoint.clone(),
            model: config.model.clone(),
            key: config.api_key.clone(),
        }
    }
}

/// User-supplied subset of the settings, in its persisted JSON shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsOverride {
    #[serde(rename = "apiEndpoint", default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "apiKey", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn provided(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SettingsOverride {
    /// True when no field carries a non-blank value.
    pub fn is_empty(&self) -> bool {
        provided(&self.api_endpoint).is_none()
            && provided(&self.model).is_none()
            && provided(&self.api_key).is_none()
    }

    /// Drop blank fields and trim the rest.
    pub fn normalized(&self) -> Self {
        Self {
            api_endpoint: provided(&self.api_endpoint).map(str::to_string),
            model: provided(&self.model).map(str::to_string),
            api_key: provided(&self.api_key).map(str::to_string),
        }
    }

    /// Fields present in `newer` replace ours; absent ones are kept.
    pub fn updated_with(&self, newer: &SettingsOverride) -> Self {
        let newer = newer.normalized();
        let current = self.normalized();
        Self {
            api_endpoint: newer.api_endpoint.or(current.api_endpoint),
            model: newer.model.or(current.model),
            api_key: newer.api_key.or(current.api_key),
        }
    }

    /// Apply this override over `defaults`. Absent or blank fields fall back.
    pub fn apply_to(&self, defaults: &ApiSettings) -> ApiSettings {
        ApiSettings {
            endpoint: provided(&self.api_endpoint)
                .map(str::to_string)
                .unwrap_or_else(|| defaults.endpoint.clone()),
            model: provided(&self.model)
                .map(str::to_string)
                .unwrap_or_else(|| defaults.model.clone()),
            key: provided(&self.api_key)
                .map(str::to_string)
                .unwrap_or_else(|| defaults.key.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim() {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }
}

/// Single owner of the effective settings.
///
/// Readers call [`SettingsStore::get`] on every remote call; components that
/// need live updates hold a [`watch::Receiver`] from [`SettingsStore::subscribe`].
#[derive(Clone)]
pub struct SettingsStore {
    defaults: ApiSettings,
    storage: Arc<SettingsStorage>,
    persisted: Arc<RwLock<SettingsOverride>>,
    changes: Arc<watch::Sender<ApiSettings>>,
}

impl SettingsStore {
    /// Load the persisted override once and merge it over `defaults`.
    pub async fn load(defaults: ApiSettings, storage: SettingsStorage) -> anyhow::Result<Self> {
        let persisted = storage.load_override().await?.unwrap_or_default();
        let effective = persisted.apply_to(&defaults);
        let (tx, _rx) = watch::channel(effective);
        Ok(Self {
            defaults,
            storage: Arc::new(storage),
            persisted: Arc::new(RwLock::new(persisted)),
            changes: Arc::new(tx),
        })
    }

    pub fn get(&self) -> ApiSettings {
        self.changes.borrow().clone()
    }

    /// True when a persisted override is in effect.
    pub async fn is_customized(&self) -> bool {
        !self.persisted.read().await.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<ApiSettings> {
        self.changes.subscribe()
    }

    /// Merge `update` over the persisted override, write it and publish the result.
    pub async fn save(&self, update: &SettingsOverride) -> anyhow::Result<ApiSettings> {
        let mut persisted = self.persisted.write().await;
        let next = persisted.updated_with(update);
        self.storage.save_override(&next).await?;
        *persisted = next;
        let effective = persisted.apply_to(&self.defaults);
        self.changes.send_replace(effective.clone());
        info!(endpoint = %effective.endpoint, model = %effective.model, "Settings saved");
        Ok(effective)
    }

    /// Forget the persisted override and fall back to the built-in defaults.
    pub async fn reset(&self) -> anyhow::Result<ApiSettings> {
        let mut persisted = self.persisted.write().await;
        self.storage.clear_override().await?;
        *persisted = SettingsOverride::default();
        self.changes.send_replace(self.defaults.clone());
        info!("Settings reset to defaults");
        Ok(self.defaults.clone())
    }

    /// Stored theme, if the user ever chose one.
    pub async fn theme(&self) -> anyhow::Result<Option<Theme>> {
        self.storage.load_theme().await
    }

    pub async fn set_theme(&self, theme: Theme) -> anyhow::Result<Theme> {
        self.storage.save_theme(theme).await?;
        Ok(theme)
    }

    /// Flip the stored theme. With nothing stored, `current` is what the page shows.
    pub async fn toggle_theme(&self, current: Option<Theme>) -> anyhow::Result<Theme> {
        let shown = match self.storage.load_theme().await? {
            Some(stored) => stored,
            None => current.unwrap_or(Theme::Light),
        };
        self.set_theme(shown.toggled()).await
    }
}

/// Settings response for the frontend (masks the API key)
#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    #[serde(rename = "apiEndpoint")]
    pub api_endpoint: String,
    pub model: String,
    #[serde(rename = "hasKey")]
    pub has_key: bool,
    /// Masked version of the key (last 4 chars only)
    #[serde(rename = "keyHint")]
    pub key_hint: Option<String>,
    pub customized: bool,
}

impl SettingsResponse {
    pub fn new(settings: &ApiSettings, customized: bool) -> Self {
        let key = settings.key.as_str();
        let key_hint = match key.chars().count() {
            0 => None,
            n if n > 4 => {
                let tail: String = key.chars().skip(n - 4).collect();
                Some(format!("••••{}", tail))
            }
            _ => Some("••••".to_string()),
        };
        Self {
            api_endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            has_key: !key.is_empty(),
            key_hint,
            customized,
        }
    }
}
